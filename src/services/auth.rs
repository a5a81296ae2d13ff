use crate::{config::Config, error::{AppError, Result}};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

#[derive(Clone)]
pub struct AuthService {
    config: Config,
    http_client: Client,
    user_cache: Arc<RwLock<HashMap<String, CachedUser>>>,
}

#[derive(Debug, Clone)]
struct CachedUser {
    user: User,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // 用户ID
    pub exp: i64,           // 过期时间
    pub iat: i64,           // 签发时间
    pub email: Option<String>, // 邮箱
}

/// 当前登录用户
/// 身份与角色完全由 Rainbow-Auth 维护，这里只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub branch_code: String,
    pub is_manager: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RainbowAuthUserResponse {
    pub id: String,
    pub email: String,
    pub created_at: String,
    pub profile: Option<StaffProfileResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StaffProfileResponse {
    pub display_name: Option<String>,
    pub branch_code: Option<String>,
    pub is_manager: Option<bool>,
}

impl AuthService {
    pub async fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            http_client,
            user_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.config.jwt_secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token verified for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                Err(AppError::Authentication("Invalid token".to_string()))
            }
        }
    }

    pub async fn get_user_from_rainbow_auth(&self, user_id: &str, token: &str) -> Result<User> {
        // 检查缓存
        if let Some(cached_user) = self.get_cached_user(user_id).await {
            debug!("Using cached user data for user: {}", user_id);
            return Ok(cached_user);
        }

        // 调用 Rainbow-Auth 获取用户信息
        let url = format!("{}/api/users/me", self.config.auth_service_url);

        let response = self.http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to fetch user from Rainbow-Auth: {}", e);
                AppError::ExternalService("Failed to verify user with Rainbow-Auth".to_string())
            })?;

        if !response.status().is_success() {
            warn!("Rainbow-Auth returned error status: {}", response.status());
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        let user_data: RainbowAuthUserResponse = response.json().await
            .map_err(|e| {
                error!("Failed to parse Rainbow-Auth response: {}", e);
                AppError::Authentication("Invalid response from Rainbow-Auth".to_string())
            })?;

        // 门店归属与角色来自员工档案，没有档案的账号不能使用工单系统
        let profile = user_data.profile.ok_or_else(|| {
            warn!("User {} has no staff profile in Rainbow-Auth", user_data.id);
            AppError::Authorization("No staff profile assigned".to_string())
        })?;

        let branch_code = profile.branch_code.ok_or_else(|| {
            warn!("User {} has no branch assignment", user_data.id);
            AppError::Authorization("No branch assignment".to_string())
        })?;

        let user = User {
            id: user_data.id.clone(),
            email: user_data.email,
            display_name: profile.display_name,
            branch_code,
            is_manager: profile.is_manager.unwrap_or(false),
            created_at: user_data.created_at
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
        };

        self.cache_user(&user).await;

        Ok(user)
    }

    async fn get_cached_user(&self, user_id: &str) -> Option<User> {
        let cache = self.user_cache.read().await;
        cache.get(user_id).and_then(|cached| {
            if cached.expires_at > Utc::now() {
                Some(cached.user.clone())
            } else {
                None
            }
        })
    }

    async fn cache_user(&self, user: &User) {
        let mut cache = self.user_cache.write().await;
        cache.insert(
            user.id.clone(),
            CachedUser {
                user: user.clone(),
                expires_at: Utc::now() + Duration::seconds(self.config.auth_cache_ttl as i64),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(auth_url: String) -> Config {
        Config {
            auth_service_url: auth_url,
            jwt_secret: "test-secret".to_string(),
            ..Config::default()
        }
    }

    fn make_token(secret: &str, user_id: &str) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
            iat: Utc::now().timestamp(),
            email: Some("staff@example.com".to_string()),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_ref()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn verify_jwt_accepts_tokens_signed_with_shared_secret() {
        let service = AuthService::new(&test_config("http://localhost:0".to_string()))
            .await
            .unwrap();

        let token = make_token("test-secret", "user-1");
        let claims = service.verify_jwt(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
    }

    #[tokio::test]
    async fn verify_jwt_rejects_tokens_with_wrong_secret() {
        let service = AuthService::new(&test_config("http://localhost:0".to_string()))
            .await
            .unwrap();

        let token = make_token("another-secret", "user-1");
        let err = service.verify_jwt(&token).unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn resolves_branch_identity_from_rainbow_auth() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/me"))
            .and(header("Authorization", "Bearer token-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-7",
                "email": "staff@example.com",
                "created_at": "2025-02-01T08:00:00Z",
                "profile": {
                    "display_name": "王小明",
                    "branch_code": "SH01",
                    "is_manager": false
                }
            })))
            .mount(&mock_server)
            .await;

        let service = AuthService::new(&test_config(mock_server.uri())).await.unwrap();
        let user = service
            .get_user_from_rainbow_auth("user-7", "token-abc")
            .await
            .unwrap();

        assert_eq!(user.id, "user-7");
        assert_eq!(user.branch_code, "SH01");
        assert!(!user.is_manager);
    }

    #[tokio::test]
    async fn rejects_accounts_without_staff_profile() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-9",
                "email": "outsider@example.com",
                "created_at": "2025-02-01T08:00:00Z",
                "profile": null
            })))
            .mount(&mock_server)
            .await;

        let service = AuthService::new(&test_config(mock_server.uri())).await.unwrap();
        let err = service
            .get_user_from_rainbow_auth("user-9", "token-abc")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn caches_resolved_users_until_ttl() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-7",
                "email": "staff@example.com",
                "created_at": "2025-02-01T08:00:00Z",
                "profile": {
                    "display_name": null,
                    "branch_code": "BJ02",
                    "is_manager": true
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let service = AuthService::new(&test_config(mock_server.uri())).await.unwrap();
        let first = service
            .get_user_from_rainbow_auth("user-7", "token-abc")
            .await
            .unwrap();
        let second = service
            .get_user_from_rainbow_auth("user-7", "token-abc")
            .await
            .unwrap();

        // 第二次命中缓存，auth 服务只被调用一次
        assert_eq!(first.branch_code, second.branch_code);
        assert!(second.is_manager);
    }
}
