use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,

    // Database configuration
    pub database_url: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,

    // Authentication configuration
    pub auth_service_url: String,
    pub jwt_secret: String,
    pub auth_cache_ttl: u64,

    // Image host configuration
    pub image_host_url: String,
    pub image_host_api_key: String,
    // 当前套餐没有删除接口，付费套餐开放后置为 true
    pub image_host_supports_delete: bool,
    pub max_upload_size: u64,
    pub allowed_image_types: String,

    // Retention sweep scheduling
    pub sweep_interval_secs: u64,

    // Content settings
    pub default_requests_per_page: usize,

    // Rate limiting
    pub rate_limit_requests: u32,
    pub rate_limit_window: u64,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "localhost:8000".to_string()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "rainbow".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "maintenance".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or_else(|_| "root".to_string()),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or_else(|_| "root".to_string()),

            auth_service_url: env::var("AUTH_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            auth_cache_ttl: env::var("AUTH_CACHE_TTL")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,

            image_host_url: env::var("IMAGE_HOST_URL")
                .unwrap_or_else(|_| "https://api.imgbb.com".to_string()),
            image_host_api_key: env::var("IMAGE_HOST_API_KEY")
                .unwrap_or_default(),
            image_host_supports_delete: env::var("IMAGE_HOST_SUPPORTS_DELETE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .unwrap_or_else(|_| "10485760".to_string())
                .parse()?,
            allowed_image_types: env::var("ALLOWED_IMAGE_TYPES")
                .unwrap_or_else(|_| "jpeg,jpg,png,gif,webp".to_string()),

            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()?,

            default_requests_per_page: env::var("DEFAULT_REQUESTS_PER_PAGE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,

            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            rate_limit_window: env::var("RATE_LIMIT_WINDOW")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            environment: "development".to_string(),
            log_level: "info".to_string(),
            database_url: "localhost:8000".to_string(),
            database_namespace: "rainbow".to_string(),
            database_name: "maintenance".to_string(),
            database_username: "root".to_string(),
            database_password: "root".to_string(),
            auth_service_url: "http://localhost:8080".to_string(),
            jwt_secret: "change-me".to_string(),
            auth_cache_ttl: 300,
            image_host_url: "https://api.imgbb.com".to_string(),
            image_host_api_key: String::new(),
            image_host_supports_delete: false,
            max_upload_size: 10_485_760,
            allowed_image_types: "jpeg,jpg,png,gif,webp".to_string(),
            sweep_interval_secs: 86_400,
            default_requests_per_page: 20,
            rate_limit_requests: 100,
            rate_limit_window: 60,
            cors_allowed_origins: "http://localhost:3001".to_string(),
        }
    }
}
