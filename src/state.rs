use crate::{
    config::Config,
    services::{
        auth::AuthService,
        cleanup::CleanupService,
        database::Database,
        image::ImageService,
        notification::NotificationService,
        request::RequestService,
        stats::StatsService,
    },
};

/// 应用程序的共享状态
/// 所有服务在进程启动时构造一次，经由 Arc 注入各个处理器；
/// 保留策略引擎也在这里保持进程内唯一实例
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Database,

    /// 认证服务
    pub auth_service: AuthService,

    /// 工单服务
    pub request_service: RequestService,

    /// 通知服务
    pub notification_service: NotificationService,

    /// 图床服务
    pub image_service: ImageService,

    /// 保留策略引擎
    pub cleanup_service: CleanupService,

    /// 仪表盘统计服务
    pub stats_service: StatsService,
}

impl AppState {
    /// 检查是否为生产环境
    pub fn is_production(&self) -> bool {
        self.config.is_production()
    }

    /// 检查是否为开发环境
    pub fn is_development(&self) -> bool {
        self.config.is_development()
    }
}
