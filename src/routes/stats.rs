use crate::{error::Result, state::AppState, utils::middleware::ManagerUser};
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/dashboard", get(dashboard))
}

/// 管理端仪表盘统计
/// GET /api/maintenance/stats/dashboard
async fn dashboard(
    State(app_state): State<Arc<AppState>>,
    ManagerUser(user): ManagerUser,
) -> Result<Json<Value>> {
    debug!("Dashboard statistics requested by manager {}", user.id);

    let stats = app_state.stats_service.dashboard().await?;

    Ok(Json(json!({
        "success": true,
        "data": stats
    })))
}
