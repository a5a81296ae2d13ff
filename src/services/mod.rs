pub mod auth;
pub mod cleanup;
pub mod database;
pub mod image;
pub mod notification;
pub mod request;
pub mod stats;

// 重新导出常用类型
pub use auth::AuthService;
pub use cleanup::CleanupService;
pub use database::Database;
pub use image::ImageService;
pub use notification::NotificationService;
pub use request::RequestService;
pub use stats::StatsService;
