use crate::{
    error::Result,
    models::request::{CreateRequestPayload, RatingPayload, RequestListQuery, UpdateStatusPayload},
    state::AppState,
    utils::middleware::AuthUser,
    utils::validation::validate_branch_code,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_request).get(list_requests))
        .route("/:request_id", get(get_request))
        .route("/:request_id/status", put(update_status))
        .route("/:request_id/cancel", post(cancel_request))
        .route("/:request_id/rating", post(rate_request))
}

/// 创建维修工单
/// POST /api/maintenance/requests
async fn create_request(
    State(app_state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(payload): Json<CreateRequestPayload>,
) -> Result<Json<Value>> {
    debug!("Creating request for branch: {}", user.branch_code);

    let created = app_state.request_service.create_request(&user, payload).await?;

    Ok(Json(json!({
        "success": true,
        "data": created
    })))
}

/// 获取工单列表
/// GET /api/maintenance/requests
async fn list_requests(
    State(app_state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<RequestListQuery>,
) -> Result<Json<Value>> {
    if let Some(branch_code) = &query.branch_code {
        validate_branch_code(branch_code)?;
    }

    let requests = app_state
        .request_service
        .list_requests(&user, query, app_state.config.default_requests_per_page)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": requests
    })))
}

/// 获取单个工单
/// GET /api/maintenance/requests/:request_id
async fn get_request(
    State(app_state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(request_id): Path<String>,
) -> Result<Json<Value>> {
    let request = app_state.request_service.get_request(&user, &request_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": request
    })))
}

/// 店长更新工单状态
/// PUT /api/maintenance/requests/:request_id/status
async fn update_status(
    State(app_state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(request_id): Path<String>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<Json<Value>> {
    let updated = app_state
        .request_service
        .update_status(&user, &request_id, payload.status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": updated
    })))
}

/// 提交门店撤销工单
/// POST /api/maintenance/requests/:request_id/cancel
async fn cancel_request(
    State(app_state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(request_id): Path<String>,
) -> Result<Json<Value>> {
    let updated = app_state
        .request_service
        .cancel_request(&user, &request_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": updated
    })))
}

/// 对已完成工单评分
/// POST /api/maintenance/requests/:request_id/rating
async fn rate_request(
    State(app_state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(request_id): Path<String>,
    Json(payload): Json<RatingPayload>,
) -> Result<Json<Value>> {
    let updated = app_state
        .request_service
        .rate_request(&user, &request_id, payload)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": updated
    })))
}
