use serde::{Deserialize, Serialize};

/// 已完成工单清理结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSweepReport {
    /// 确认删除的文档数（不含删除失败的文档）
    pub deleted_count: u64,
    /// 发起图片清理的次数（当前图床套餐下仅记录意图）
    pub images_processed: u64,
    pub success: bool,
    pub message: String,
}

/// 过期通知清理结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSweepReport {
    pub deleted_count: u64,
    pub success: bool,
    pub message: String,
}

/// 全量清理结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullSweepReport {
    pub requests: RequestSweepReport,
    pub notifications: NotificationSweepReport,
    pub total_deleted: u64,
    pub total_images_processed: u64,
}

impl FullSweepReport {
    pub fn aggregate(requests: RequestSweepReport, notifications: NotificationSweepReport) -> Self {
        let total_deleted = requests.deleted_count + notifications.deleted_count;
        let total_images_processed = requests.images_processed;
        Self {
            requests,
            notifications,
            total_deleted,
            total_images_processed,
        }
    }
}

/// 存储占用统计
/// "old" 口径固定使用30天阈值，与清理操作调用方传入的天数无关
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageStatistics {
    pub total_requests: u64,
    pub completed_requests: u64,
    pub old_completed_requests: u64,
    pub total_notifications: u64,
    pub total_images_stored: u64,
    pub old_images_for_cleanup: u64,
    /// 按默认30天口径立即清理可释放的文档数
    pub estimated_cleanup_savings: u64,
    /// 按默认30天口径可随之处理的图片数
    pub estimated_image_cleanup: u64,
}

/// POST /cleanup/sweep 请求体
/// type 保持字符串形式，未知取值由边界层返回400而不是反序列化失败
#[derive(Debug, Clone, Deserialize)]
pub struct SweepRequest {
    #[serde(rename = "type")]
    pub sweep_type: String,
    pub days_old: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_report(deleted: u64, images: u64, success: bool) -> RequestSweepReport {
        RequestSweepReport {
            deleted_count: deleted,
            images_processed: images,
            success,
            message: String::new(),
        }
    }

    fn notification_report(deleted: u64, success: bool) -> NotificationSweepReport {
        NotificationSweepReport {
            deleted_count: deleted,
            success,
            message: String::new(),
        }
    }

    #[test]
    fn full_sweep_aggregates_counts() {
        let report = FullSweepReport::aggregate(request_report(3, 2, true), notification_report(5, true));
        assert_eq!(report.total_deleted, 8);
        assert_eq!(report.total_images_processed, 2);
    }

    #[test]
    fn full_sweep_aggregates_zero_counts() {
        let report = FullSweepReport::aggregate(request_report(0, 0, true), notification_report(0, true));
        assert_eq!(report.total_deleted, 0);
        assert_eq!(report.total_images_processed, 0);
        assert!(report.requests.success);
        assert!(report.notifications.success);
    }

    #[test]
    fn full_sweep_keeps_partial_failure_visible() {
        // 一侧失败不影响另一侧结果的聚合
        let report = FullSweepReport::aggregate(request_report(0, 0, false), notification_report(4, true));
        assert_eq!(report.total_deleted, 4);
        assert!(!report.requests.success);
        assert!(report.notifications.success);
    }

    #[test]
    fn sweep_request_parses_optional_days() {
        let body: SweepRequest = serde_json::from_str(r#"{"type":"requests","days_old":14}"#).unwrap();
        assert_eq!(body.sweep_type, "requests");
        assert_eq!(body.days_old, Some(14));

        let body: SweepRequest = serde_json::from_str(r#"{"type":"full"}"#).unwrap();
        assert_eq!(body.sweep_type, "full");
        assert_eq!(body.days_old, None);
    }

    #[test]
    fn sweep_request_keeps_unknown_type_for_boundary_rejection() {
        // 未知 type 不在反序列化阶段失败，由路由层回复400
        let body: SweepRequest = serde_json::from_str(r#"{"type":"everything"}"#).unwrap();
        assert_eq!(body.sweep_type, "everything");
    }
}
