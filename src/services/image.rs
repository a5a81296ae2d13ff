use crate::{config::Config, error::{AppError, Result}};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// 图床服务
/// 上传返回持久URL；当前套餐没有删除接口，删除调用只记录意图
#[derive(Clone)]
pub struct ImageService {
    config: Config,
    http_client: Client,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageHostUploadResponse {
    pub data: ImageHostUploadData,
    pub success: bool,
    pub status: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageHostUploadData {
    pub url: String,
    pub delete_url: Option<String>,
}

impl ImageService {
    pub async fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            http_client,
        })
    }

    /// 图床是否支持远端删除
    pub fn supports_delete(&self) -> bool {
        self.config.image_host_supports_delete
    }

    /// 上传图片，返回图床生成的持久URL
    pub async fn upload_image(
        &self,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<String> {
        if data.is_empty() {
            return Err(AppError::FileUpload("上传的文件为空".to_string()));
        }

        if data.len() as u64 > self.config.max_upload_size {
            return Err(AppError::FileUpload(format!(
                "文件大小超过限制（最大{}字节）",
                self.config.max_upload_size
            )));
        }

        self.validate_content_type(content_type)?;

        debug!(
            "Uploading image {} ({}, {} bytes) to image host",
            filename,
            content_type,
            data.len()
        );

        let encoded = BASE64.encode(&data);
        let params = [
            ("key", self.config.image_host_api_key.as_str()),
            ("image", encoded.as_str()),
            ("name", filename),
        ];

        let url = format!("{}/1/upload", self.config.image_host_url);
        let response = self
            .http_client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!("Image host upload request failed: {}", e);
                AppError::ExternalService("Image host is unreachable".to_string())
            })?;

        if !response.status().is_success() {
            error!("Image host returned error status: {}", response.status());
            return Err(AppError::ExternalService(format!(
                "Image host rejected the upload ({})",
                response.status()
            )));
        }

        let body: ImageHostUploadResponse = response.json().await.map_err(|e| {
            error!("Failed to parse image host response: {}", e);
            AppError::ExternalService("Invalid response from image host".to_string())
        })?;

        if !body.success {
            return Err(AppError::ExternalService(
                "Image host reported upload failure".to_string(),
            ));
        }

        info!("Uploaded image {} to {}", filename, body.data.url);
        Ok(body.data.url)
    }

    /// 通知图床该图片可以删除
    /// 返回是否真正发生了远端删除
    pub async fn delete_image(&self, image_url: &str) -> Result<bool> {
        if !self.supports_delete() {
            // 当前套餐没有删除接口，只记录意图
            debug!("Image host plan has no delete API, recording intent for {}", image_url);
            return Ok(false);
        }

        let params = [
            ("key", self.config.image_host_api_key.as_str()),
            ("url", image_url),
        ];

        let url = format!("{}/1/delete", self.config.image_host_url);
        let response = self
            .http_client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!("Image host delete request failed: {}", e);
                AppError::ExternalService("Image host is unreachable".to_string())
            })?;

        if !response.status().is_success() {
            warn!(
                "Image host refused to delete {} ({})",
                image_url,
                response.status()
            );
            return Ok(false);
        }

        info!("Deleted image {} from image host", image_url);
        Ok(true)
    }

    pub(crate) fn validate_content_type(&self, content_type: &str) -> Result<()> {
        let subtype = content_type
            .strip_prefix("image/")
            .ok_or_else(|| AppError::FileUpload("只允许上传图片文件".to_string()))?;

        let allowed = self
            .config
            .allowed_image_types
            .split(',')
            .any(|t| t.trim().eq_ignore_ascii_case(subtype));

        if !allowed {
            return Err(AppError::FileUpload(format!(
                "不支持的图片格式：{}（允许：{}）",
                subtype, self.config.allowed_image_types
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(host_url: String) -> Config {
        Config {
            image_host_url: host_url,
            image_host_api_key: "test-key".to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn upload_returns_durable_url() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "url": "https://images.example.com/abc123.png",
                    "delete_url": null
                },
                "success": true,
                "status": 200
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let service = ImageService::new(&test_config(mock_server.uri())).await.unwrap();
        let url = service
            .upload_image("broken-shelf.png", "image/png", vec![0u8; 128])
            .await
            .unwrap();

        assert_eq!(url, "https://images.example.com/abc123.png");
    }

    #[tokio::test]
    async fn upload_propagates_host_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/upload"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let service = ImageService::new(&test_config(mock_server.uri())).await.unwrap();
        let err = service
            .upload_image("broken-shelf.png", "image/png", vec![0u8; 128])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ExternalService(_)));
    }

    #[tokio::test]
    async fn upload_rejects_oversized_payload_before_calling_host() {
        let mock_server = MockServer::start().await;
        let mut config = test_config(mock_server.uri());
        config.max_upload_size = 64;

        let service = ImageService::new(&config).await.unwrap();
        let err = service
            .upload_image("huge.png", "image/png", vec![0u8; 65])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::FileUpload(_)));
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_rejects_disallowed_content_type() {
        let mock_server = MockServer::start().await;
        let service = ImageService::new(&test_config(mock_server.uri())).await.unwrap();

        let err = service
            .upload_image("report.pdf", "application/pdf", vec![0u8; 16])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FileUpload(_)));

        let err = service
            .upload_image("movie.bmp", "image/bmp", vec![0u8; 16])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FileUpload(_)));
    }

    #[tokio::test]
    async fn delete_without_capability_records_intent_only() {
        let mock_server = MockServer::start().await;
        let service = ImageService::new(&test_config(mock_server.uri())).await.unwrap();

        assert!(!service.supports_delete());
        let removed = service
            .delete_image("https://images.example.com/abc123.png")
            .await
            .unwrap();

        // 没有删除能力时不发起任何远端调用
        assert!(!removed);
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_with_capability_calls_host() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/delete"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut config = test_config(mock_server.uri());
        config.image_host_supports_delete = true;

        let service = ImageService::new(&config).await.unwrap();
        let removed = service
            .delete_image("https://images.example.com/abc123.png")
            .await
            .unwrap();

        assert!(removed);
    }

    #[tokio::test]
    async fn content_type_check_follows_configured_allowlist() {
        let mock_server = MockServer::start().await;
        let service = ImageService::new(&test_config(mock_server.uri())).await.unwrap();

        assert!(service.validate_content_type("image/jpeg").is_ok());
        assert!(service.validate_content_type("image/PNG").is_ok());
        assert!(service.validate_content_type("image/tiff").is_err());
        assert!(service.validate_content_type("text/html").is_err());
    }
}
