pub mod cleanup;
pub mod notification;
pub mod request;

// 重新导出常用类型
pub use cleanup::{
    FullSweepReport, NotificationSweepReport, RequestSweepReport, StorageStatistics, SweepRequest,
};
pub use notification::{Notification, NotificationType};
pub use request::{MaintenanceRequest, RequestPriority, RequestStatus};
