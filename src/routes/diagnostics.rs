use crate::{
    error::{AppError, Result},
    state::AppState,
};
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(diagnostics))
}

/// 诊断端点（仅开发环境可用）
/// GET /api/maintenance/diagnostics
async fn diagnostics(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    if !state.is_development() {
        return Err(AppError::forbidden("Diagnostics endpoint is only available in development"));
    }

    debug!("Running diagnostics endpoint");

    // 基本配置信息
    let ns = state.config.database_namespace.clone();
    let db = state.config.database_name.clone();
    let url = state.config.database_url.clone();

    // 统计若干关键表计数
    async fn count_table(state: &AppState, table: &str) -> u64 {
        let sql = format!("SELECT count() AS total FROM {} GROUP ALL", table);
        match state.db.query(&sql).await {
            Ok(mut resp) => {
                if let Ok(Some(v)) = resp.take::<Option<Value>>(0) {
                    v.get("total").and_then(|x| x.as_u64()).unwrap_or(0)
                } else { 0 }
            }
            Err(_) => 0,
        }
    }

    let request_count = count_table(&state, "maintenance_request").await;
    let notification_count = count_table(&state, "notification").await;

    Ok(Json(json!({
        "success": true,
        "data": {
            "database": {
                "namespace": ns,
                "name": db,
                "url": url,
            },
            "counts": {
                "maintenance_request": request_count,
                "notification": notification_count,
            }
        }
    })))
}
