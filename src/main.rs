use std::sync::Arc;
use axum::{
    routing::{Router, get},
    http::{Method, HeaderValue},
    middleware,
};
use tower_http::{
    cors::{CorsLayer, Any},
    compression::CompressionLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing::{info, warn, error};
use tokio::time::{interval, Duration};

mod routes;
mod models;
mod services;
mod config;
mod error;
mod utils;
mod state;

use crate::{
    config::Config,
    state::AppState,
    services::{
        Database,
        AuthService,
        CleanupService,
        ImageService,
        NotificationService,
        RequestService,
        StatsService,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("LOG_LEVEL").unwrap_or_else(|_| "rainbow_maintenance=debug,tower_http=debug".into())
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rainbow-Maintenance service...");

    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化数据库连接
    let db = Arc::new(match Database::new(&config).await {
        Ok(db) => {
            match db.verify_connection().await {
                Ok(_) => {
                    info!("Database connection established successfully");
                    db
                }
                Err(e) => {
                    warn!("Database connection failed: {}", e);
                    info!("Attempting to auto-start database...");

                    // 尝试自动启动数据库
                    if let Err(start_err) = auto_start_database(&config).await {
                        error!("Failed to auto-start database: {}. Original error: {}", start_err, e);
                        return Err(anyhow::anyhow!("Database connection failed"));
                    }

                    // 重新尝试连接
                    let db = Database::new(&config).await?;
                    db.verify_connection().await?;
                    info!("Database auto-started and connected successfully");
                    db
                }
            }
        }
        Err(e) => {
            error!("Failed to create database connection: {}", e);
            return Err(anyhow::anyhow!("Database initialization failed"));
        }
    });

    // 初始化所有服务
    let auth_service = AuthService::new(&config).await?;
    let image_service = ImageService::new(&config).await?;
    let notification_service = NotificationService::new(db.clone()).await?;
    let request_service = RequestService::new(db.clone(), notification_service.clone()).await?;
    let cleanup_service = CleanupService::new(db.clone(), image_service.clone()).await?;
    let stats_service = StatsService::new(db.clone()).await?;

    // 创建应用状态
    let app_state = Arc::new(AppState {
        config: config.clone(),
        db: (*db).clone(),
        auth_service,
        request_service,
        notification_service,
        image_service,
        cleanup_service,
        stats_service,
    });

    // 启动后台任务
    start_background_tasks(app_state.clone()).await;

    // 配置 CORS
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(
            config.cors_allowed_origins
                .split(',')
                .map(|origin| origin.parse::<HeaderValue>().unwrap())
                .collect::<Vec<_>>(),
        );

    // 构建应用路由 - 使用/api/maintenance/前缀避免网关路由冲突
    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .nest("/api/maintenance/auth", routes::auth::router())
        .nest("/api/maintenance/requests", routes::requests::router())
        .nest("/api/maintenance/notifications", routes::notifications::router())
        .nest("/api/maintenance/media", routes::media::router())
        .nest("/api/maintenance/stats", routes::stats::router())
        .nest("/api/maintenance/cleanup", routes::cleanup::router())
        .nest("/api/maintenance/diagnostics", routes::diagnostics::router())
        .layer(middleware::from_fn_with_state(app_state.clone(), utils::middleware::auth_middleware))
        .layer(middleware::from_fn_with_state(app_state.clone(), utils::middleware::rate_limit_middleware))
        .layer(middleware::from_fn(utils::middleware::request_logging_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "Rainbow-Maintenance is running!"
}

async fn auto_start_database(config: &Config) -> anyhow::Result<()> {
    info!("Attempting to start SurrealDB...");

    // 尝试启动 SurrealDB 进程
    let output = tokio::process::Command::new("surreal")
        .args(&[
            "start",
            "--user", &config.database_username,
            "--pass", &config.database_password,
            "memory",
        ])
        .spawn();

    match output {
        Ok(_) => {
            info!("SurrealDB started successfully");
            // 等待数据库启动
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok(())
        }
        Err(e) => {
            error!("Failed to start SurrealDB: {}", e);
            Err(anyhow::anyhow!("Failed to start database"))
        }
    }
}

async fn start_background_tasks(app_state: Arc<AppState>) {
    info!("Starting background tasks...");

    // 周期性保留清理任务
    // 引擎自身不持有定时器，由这里按配置的间隔触发
    let sweep_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(
            sweep_state.config.sweep_interval_secs
        ));

        loop {
            interval.tick().await;
            let report = sweep_state.cleanup_service.run_full_sweep().await;
            if report.requests.success && report.notifications.success {
                info!(
                    "Scheduled sweep removed {} documents ({} images processed)",
                    report.total_deleted, report.total_images_processed
                );
            } else {
                error!(
                    "Scheduled sweep finished with failures: requests: {} / notifications: {}",
                    report.requests.message, report.notifications.message
                );
            }
        }
    });

    info!("Background tasks started successfully");
}
