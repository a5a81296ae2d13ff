use crate::{
    error::{AppError, Result},
    models::cleanup::SweepRequest,
    state::AppState,
    utils::middleware::ManagerUser,
};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// HTTP边界自己的 days_old 兜底值
/// 注意与引擎内部的 DEFAULT_REQUEST_RETENTION_DAYS(30) 不一致：
/// 这是沿袭下来的差异，是否统一待定，勿顺手改掉（见 DESIGN.md）
pub const DEFAULT_BOUNDARY_FALLBACK_DAYS: u32 = 7;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(storage_stats))
        .route("/sweep", post(run_sweep))
}

/// 清理动作由请求体解析而来
#[derive(Debug, PartialEq, Eq)]
enum SweepAction {
    Requests { days_old: u32 },
    Full,
}

fn resolve_sweep_action(body: &SweepRequest) -> Result<SweepAction> {
    match body.sweep_type.as_str() {
        "requests" => Ok(SweepAction::Requests {
            days_old: body.days_old.unwrap_or(DEFAULT_BOUNDARY_FALLBACK_DAYS),
        }),
        // full 忽略 days_old，使用引擎默认保留期
        "full" => Ok(SweepAction::Full),
        other => Err(AppError::BadRequest(format!(
            "Unknown sweep type: {}",
            other
        ))),
    }
}

/// 存储占用统计
/// GET /api/maintenance/cleanup/stats
async fn storage_stats(
    State(app_state): State<Arc<AppState>>,
    ManagerUser(user): ManagerUser,
) -> Result<Json<Value>> {
    let stats = app_state.cleanup_service.storage_statistics().await?;

    info!("Storage statistics requested by manager {}", user.id);

    Ok(Json(json!({
        "success": true,
        "data": stats
    })))
}

/// 手动触发清理
/// POST /api/maintenance/cleanup/sweep
/// 清理结果原样作为JSON返回；success=false 的结果仍然是 HTTP 200
async fn run_sweep(
    State(app_state): State<Arc<AppState>>,
    ManagerUser(user): ManagerUser,
    Json(body): Json<SweepRequest>,
) -> Result<Json<Value>> {
    let action = resolve_sweep_action(&body)?;

    info!("Manual sweep {:?} triggered by manager {}", action, user.id);

    match action {
        SweepAction::Requests { days_old } => {
            let report = app_state
                .cleanup_service
                .sweep_completed_requests(days_old)
                .await;
            Ok(Json(serde_json::to_value(report)?))
        }
        SweepAction::Full => {
            let report = app_state.cleanup_service.run_full_sweep().await;
            Ok(Json(serde_json::to_value(report)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cleanup::DEFAULT_REQUEST_RETENTION_DAYS;

    fn body(sweep_type: &str, days_old: Option<u32>) -> SweepRequest {
        SweepRequest {
            sweep_type: sweep_type.to_string(),
            days_old,
        }
    }

    #[test]
    fn requests_sweep_uses_explicit_days() {
        let action = resolve_sweep_action(&body("requests", Some(60))).unwrap();
        assert_eq!(action, SweepAction::Requests { days_old: 60 });
    }

    #[test]
    fn requests_sweep_falls_back_to_boundary_default() {
        // 边界兜底是7天，刻意区别于引擎默认的30天
        let action = resolve_sweep_action(&body("requests", None)).unwrap();
        assert_eq!(
            action,
            SweepAction::Requests {
                days_old: DEFAULT_BOUNDARY_FALLBACK_DAYS
            }
        );
        assert_ne!(DEFAULT_BOUNDARY_FALLBACK_DAYS, DEFAULT_REQUEST_RETENTION_DAYS);
    }

    #[test]
    fn full_sweep_ignores_days_old() {
        let action = resolve_sweep_action(&body("full", Some(99))).unwrap();
        assert_eq!(action, SweepAction::Full);
    }

    #[test]
    fn unknown_type_is_rejected_without_engine_call() {
        let err = resolve_sweep_action(&body("everything", None)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
