use crate::{
    error::Result,
    models::cleanup::*,
    models::notification::Notification,
    models::request::{MaintenanceRequest, RequestStatus},
    services::{Database, ImageService},
};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};

/// 引擎自身的保留期默认值
pub const DEFAULT_REQUEST_RETENTION_DAYS: u32 = 30;
pub const DEFAULT_NOTIFICATION_RETENTION_DAYS: u32 = 7;

/// 存储统计固定使用30天口径，与清理调用方传入的天数无关
pub const STATISTICS_RETENTION_DAYS: u32 = 30;

/// 保留策略引擎
/// 无内部状态，不持有定时器；周期触发由宿主进程负责
#[derive(Clone)]
pub struct CleanupService {
    db: Arc<Database>,
    image_service: ImageService,
}

/// "now 减去 days_old 天"
pub fn cutoff(days_old: u32) -> DateTime<Utc> {
    cutoff_from(Utc::now(), days_old)
}

pub fn cutoff_from(now: DateTime<Utc>, days_old: u32) -> DateTime<Utc> {
    now - Duration::days(days_old as i64)
}

/// 工单是否到期可删
/// 时间比较取严格小于：恰好等于阈值的文档保留
pub fn request_eligible(request: &MaintenanceRequest, cutoff: DateTime<Utc>) -> bool {
    request.status == RequestStatus::Completed && request.timestamp < cutoff
}

/// 通知是否到期可删（与已读状态无关）
pub fn notification_expired(notification: &Notification, cutoff: DateTime<Utc>) -> bool {
    notification.timestamp < cutoff
}

impl CleanupService {
    pub async fn new(db: Arc<Database>, image_service: ImageService) -> Result<Self> {
        Ok(Self { db, image_service })
    }

    /// 清理已完成的过期工单
    /// 存储层错误只令本次清理失败，不向上传播
    pub async fn sweep_completed_requests(&self, days_old: u32) -> RequestSweepReport {
        match self.sweep_completed_requests_inner(days_old).await {
            Ok(report) => report,
            Err(e) => {
                error!("Completed-request sweep failed: {}", e);
                RequestSweepReport {
                    deleted_count: 0,
                    images_processed: 0,
                    success: false,
                    message: format!("Sweep failed: {}", e),
                }
            }
        }
    }

    async fn sweep_completed_requests_inner(&self, days_old: u32) -> Result<RequestSweepReport> {
        let cutoff = cutoff(days_old);
        debug!("Sweeping completed requests older than {} days (cutoff {})", days_old, cutoff);

        let query = r#"
            SELECT * FROM maintenance_request
            WHERE status = $status AND timestamp < $cutoff
        "#;
        let mut response = self.db.query_with_params(query, json!({
            "status": RequestStatus::Completed,
            "cutoff": cutoff
        })).await?;

        let candidates: Vec<MaintenanceRequest> = response.take(0)?;
        // 边界判定以解析后的时间为准，等于阈值的文档保留
        let matched: Vec<MaintenanceRequest> = candidates
            .into_iter()
            .filter(|r| request_eligible(r, cutoff))
            .collect();

        if matched.is_empty() {
            return Ok(RequestSweepReport {
                deleted_count: 0,
                images_processed: 0,
                success: true,
                message: "No completed requests needed cleanup".to_string(),
            });
        }

        // 图片清理先于文档删除，并发发起后统一等待
        // 当前图床套餐没有删除接口时仍计入 images_processed
        let image_attempts: Vec<_> = matched
            .iter()
            .filter_map(|r| r.image_url.as_deref())
            .map(|url| self.image_service.delete_image(url))
            .collect();
        let image_results = join_all(image_attempts).await;
        let images_processed = image_results.len() as u64;
        let images_removed = image_results
            .iter()
            .filter(|r| matches!(r, Ok(true)))
            .count();
        if images_removed > 0 {
            info!("Removed {} images from image host", images_removed);
        }

        // 文档删除逐条独立发起，无批量原子性
        let deletions: Vec<_> = matched
            .iter()
            .map(|r| self.db.delete_by_id("maintenance_request", &r.id))
            .collect();
        let outcomes = join_all(deletions).await;

        // deleted_count 只统计确认删除成功的文档
        let deleted_count = outcomes.iter().filter(|o| o.is_ok()).count() as u64;
        let failed = outcomes.len() as u64 - deleted_count;

        if failed > 0 {
            return Ok(RequestSweepReport {
                deleted_count,
                images_processed,
                success: false,
                message: format!(
                    "{} of {} request deletions failed",
                    failed,
                    outcomes.len()
                ),
            });
        }

        info!("Swept {} completed requests older than {} days", deleted_count, days_old);
        Ok(RequestSweepReport {
            deleted_count,
            images_processed,
            success: true,
            message: format!(
                "Removed {} completed requests older than {} days",
                deleted_count, days_old
            ),
        })
    }

    /// 清理过期通知（与已读状态无关）
    pub async fn sweep_old_notifications(&self, days_old: u32) -> NotificationSweepReport {
        match self.sweep_old_notifications_inner(days_old).await {
            Ok(report) => report,
            Err(e) => {
                error!("Notification sweep failed: {}", e);
                NotificationSweepReport {
                    deleted_count: 0,
                    success: false,
                    message: format!("Sweep failed: {}", e),
                }
            }
        }
    }

    async fn sweep_old_notifications_inner(&self, days_old: u32) -> Result<NotificationSweepReport> {
        let cutoff = cutoff(days_old);
        debug!("Sweeping notifications older than {} days (cutoff {})", days_old, cutoff);

        let query = r#"
            SELECT * FROM notification
            WHERE timestamp < $cutoff
        "#;
        let mut response = self.db.query_with_params(query, json!({
            "cutoff": cutoff
        })).await?;

        let candidates: Vec<Notification> = response.take(0)?;
        let matched: Vec<Notification> = candidates
            .into_iter()
            .filter(|n| notification_expired(n, cutoff))
            .collect();

        if matched.is_empty() {
            return Ok(NotificationSweepReport {
                deleted_count: 0,
                success: true,
                message: "No notifications needed cleanup".to_string(),
            });
        }

        let deletions: Vec<_> = matched
            .iter()
            .map(|n| self.db.delete_by_id("notification", &n.id))
            .collect();
        let outcomes = join_all(deletions).await;

        let deleted_count = outcomes.iter().filter(|o| o.is_ok()).count() as u64;
        let failed = outcomes.len() as u64 - deleted_count;

        if failed > 0 {
            return Ok(NotificationSweepReport {
                deleted_count,
                success: false,
                message: format!(
                    "{} of {} notification deletions failed",
                    failed,
                    outcomes.len()
                ),
            });
        }

        info!("Swept {} notifications older than {} days", deleted_count, days_old);
        Ok(NotificationSweepReport {
            deleted_count,
            success: true,
            message: format!(
                "Removed {} notifications older than {} days",
                deleted_count, days_old
            ),
        })
    }

    /// 按引擎默认保留期执行全量清理
    /// 两个清理互不阻塞，一侧失败另一侧照常执行
    pub async fn run_full_sweep(&self) -> FullSweepReport {
        let requests = self
            .sweep_completed_requests(DEFAULT_REQUEST_RETENTION_DAYS)
            .await;
        let notifications = self
            .sweep_old_notifications(DEFAULT_NOTIFICATION_RETENTION_DAYS)
            .await;

        FullSweepReport::aggregate(requests, notifications)
    }

    /// 只读的存储占用统计
    pub async fn storage_statistics(&self) -> Result<StorageStatistics> {
        let cutoff = cutoff(STATISTICS_RETENTION_DAYS);

        let total_requests = self
            .count("SELECT count() AS total FROM maintenance_request GROUP ALL", json!({}))
            .await?;
        let completed_requests = self
            .count(
                "SELECT count() AS total FROM maintenance_request WHERE status = $status GROUP ALL",
                json!({ "status": RequestStatus::Completed }),
            )
            .await?;
        let old_completed_requests = self
            .count(
                "SELECT count() AS total FROM maintenance_request WHERE status = $status AND timestamp < $cutoff GROUP ALL",
                json!({ "status": RequestStatus::Completed, "cutoff": cutoff }),
            )
            .await?;
        let total_notifications = self
            .count("SELECT count() AS total FROM notification GROUP ALL", json!({}))
            .await?;
        let old_notifications = self
            .count(
                "SELECT count() AS total FROM notification WHERE timestamp < $cutoff GROUP ALL",
                json!({ "cutoff": cutoff }),
            )
            .await?;
        let total_images_stored = self
            .count(
                "SELECT count() AS total FROM maintenance_request WHERE image_url != NONE GROUP ALL",
                json!({}),
            )
            .await?;
        let old_images_for_cleanup = self
            .count(
                "SELECT count() AS total FROM maintenance_request WHERE status = $status AND timestamp < $cutoff AND image_url != NONE GROUP ALL",
                json!({ "status": RequestStatus::Completed, "cutoff": cutoff }),
            )
            .await?;

        Ok(StorageStatistics {
            total_requests,
            completed_requests,
            old_completed_requests,
            total_notifications,
            total_images_stored,
            old_images_for_cleanup,
            estimated_cleanup_savings: old_completed_requests + old_notifications,
            estimated_image_cleanup: old_images_for_cleanup,
        })
    }

    async fn count(&self, sql: &str, params: serde_json::Value) -> Result<u64> {
        let mut response = self.db.query_with_params(sql, params).await?;
        let row: Option<serde_json::Value> = response.take(0)?;
        Ok(row
            .and_then(|v| v.get("total").and_then(|t| t.as_u64()))
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::NotificationType;
    use crate::models::request::RequestPriority;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    fn completed_request(age_days: i64) -> MaintenanceRequest {
        MaintenanceRequest {
            id: "req-1".to_string(),
            branch_code: "SH01".to_string(),
            title: "灯管损坏".to_string(),
            description: "二楼货架照明不亮".to_string(),
            category: "electrical".to_string(),
            priority: RequestPriority::Medium,
            status: RequestStatus::Completed,
            timestamp: fixed_now() - Duration::days(age_days),
            image_url: None,
            rating: None,
            feedback: None,
        }
    }

    #[test]
    fn cutoff_zero_days_is_now() {
        let now = fixed_now();
        assert_eq!(cutoff_from(now, 0), now);
    }

    #[test]
    fn cutoff_moves_backwards_with_days() {
        let now = fixed_now();
        assert_eq!(cutoff_from(now, 30), now - Duration::days(30));
        assert!(cutoff_from(now, 30) > cutoff_from(now, 31));
    }

    proptest! {
        #[test]
        fn cutoff_is_monotonically_earlier(a in 0u32..3650, b in 0u32..3650) {
            let now = fixed_now();
            if a < b {
                prop_assert!(cutoff_from(now, a) > cutoff_from(now, b));
            } else if a == b {
                prop_assert_eq!(cutoff_from(now, a), cutoff_from(now, b));
            } else {
                prop_assert!(cutoff_from(now, a) < cutoff_from(now, b));
            }
        }
    }

    #[test]
    fn old_completed_request_is_eligible() {
        let cutoff = cutoff_from(fixed_now(), 30);
        assert!(request_eligible(&completed_request(40), cutoff));
    }

    #[test]
    fn recent_completed_request_is_kept() {
        let cutoff = cutoff_from(fixed_now(), 30);
        assert!(!request_eligible(&completed_request(10), cutoff));
    }

    #[test]
    fn request_exactly_at_cutoff_is_kept() {
        // 比较取严格小于：恰好30天的文档保留
        let cutoff = cutoff_from(fixed_now(), 30);
        let request = completed_request(30);
        assert_eq!(request.timestamp, cutoff);
        assert!(!request_eligible(&request, cutoff));
    }

    #[test]
    fn non_completed_request_is_never_eligible() {
        let cutoff = cutoff_from(fixed_now(), 30);
        for status in [
            RequestStatus::UnderReview,
            RequestStatus::Approved,
            RequestStatus::InProgress,
            RequestStatus::Rejected,
            RequestStatus::Cancelled,
        ] {
            let request = MaintenanceRequest {
                status,
                ..completed_request(400)
            };
            assert!(!request_eligible(&request, cutoff));
        }
    }

    #[test]
    fn notification_expiry_ignores_read_flag() {
        let cutoff = cutoff_from(fixed_now(), 7);
        for read in [false, true] {
            let notification = Notification {
                id: "ntf-1".to_string(),
                title: "工单状态更新".to_string(),
                message: "工单已完成".to_string(),
                notification_type: NotificationType::StatusUpdate,
                timestamp: fixed_now() - Duration::days(8),
                read,
                branch_code: "SH01".to_string(),
                is_for_manager: false,
            };
            assert!(notification_expired(&notification, cutoff));
        }
    }

    #[test]
    fn notification_exactly_at_cutoff_is_kept() {
        let cutoff = cutoff_from(fixed_now(), 7);
        let notification = Notification {
            id: "ntf-2".to_string(),
            title: "新维修工单".to_string(),
            message: "门店提交了工单".to_string(),
            notification_type: NotificationType::NewRequest,
            timestamp: cutoff,
            read: false,
            branch_code: "SH02".to_string(),
            is_for_manager: true,
        };
        assert!(!notification_expired(&notification, cutoff));
    }

    #[test]
    fn engine_defaults_stay_distinct_from_boundary_fallback() {
        // 引擎默认30/7天；HTTP边界对 requests 清理另有7天兜底
        // 两组常量刻意不合并，见 DESIGN.md
        assert_eq!(DEFAULT_REQUEST_RETENTION_DAYS, 30);
        assert_eq!(DEFAULT_NOTIFICATION_RETENTION_DAYS, 7);
        assert_eq!(STATISTICS_RETENTION_DAYS, 30);
    }
}
