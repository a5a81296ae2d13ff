use crate::{
    error::Result,
    models::notification::NotificationListQuery,
    state::AppState,
    utils::middleware::AuthUser,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", put(mark_all_read))
        .route("/:notification_id/read", put(mark_read))
}

/// 获取当前用户的通知列表
/// GET /api/maintenance/notifications
async fn list_notifications(
    State(app_state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<Value>> {
    let limit = query.limit.unwrap_or(50).min(100);
    let notifications = app_state
        .notification_service
        .list_notifications(
            &user.branch_code,
            user.is_manager,
            query.unread_only.unwrap_or(false),
            limit,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": notifications
    })))
}

/// 获取未读通知数量
/// GET /api/maintenance/notifications/unread-count
async fn unread_count(
    State(app_state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>> {
    let count = app_state
        .notification_service
        .unread_count(&user.branch_code, user.is_manager)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": { "unread": count }
    })))
}

/// 将单条通知标记为已读
/// PUT /api/maintenance/notifications/:notification_id/read
async fn mark_read(
    State(app_state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(notification_id): Path<String>,
) -> Result<Json<Value>> {
    let updated = app_state
        .notification_service
        .mark_read(&notification_id, &user.branch_code, user.is_manager)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": updated
    })))
}

/// 全部标记为已读
/// PUT /api/maintenance/notifications/read-all
async fn mark_all_read(
    State(app_state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>> {
    app_state
        .notification_service
        .mark_all_read(&user.branch_code, user.is_manager)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "所有通知已标记为已读"
    })))
}
