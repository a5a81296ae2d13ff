use crate::{
    error::Result,
    state::AppState,
    utils::middleware::{AuthUser, OptionalAuth},
};
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(get_current_user))
        .route("/status", get(get_auth_status))
}

/// 获取当前用户信息
/// GET /api/maintenance/auth/me
///
/// 注意：实际的用户认证由 Rainbow-Auth 处理，
/// 这个端点只回显通过 JWT 解析得到的用户信息
async fn get_current_user(
    State(_app_state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>> {
    debug!("Getting current user info for user: {}", user.id);

    Ok(Json(json!({
        "success": true,
        "data": {
            "id": user.id,
            "email": user.email,
            "display_name": user.display_name,
            "branch_code": user.branch_code,
            "is_manager": user.is_manager,
            "created_at": user.created_at,
        }
    })))
}

/// 获取认证状态
/// GET /api/maintenance/auth/status
///
/// 未认证的用户也可以访问，用于检查当前的认证状态
async fn get_auth_status(
    State(_app_state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Value>> {
    debug!("Checking authentication status");

    match user {
        Some(user) => Ok(Json(json!({
            "success": true,
            "data": {
                "authenticated": true,
                "user": {
                    "id": user.id,
                    "branch_code": user.branch_code,
                    "is_manager": user.is_manager,
                }
            }
        }))),
        None => Ok(Json(json!({
            "success": true,
            "data": {
                "authenticated": false
            }
        }))),
    }
}
