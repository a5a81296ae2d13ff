use crate::{
    error::{AppError, Result},
    state::AppState,
    utils::middleware::AuthUser,
};
use axum::{
    extract::{Multipart, State},
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/upload", post(upload_image))
}

/// 上传工单图片
/// POST /api/maintenance/media/upload
/// 图片转存到外部图床，返回持久URL供创建工单时引用
async fn upload_image(
    State(app_state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<Value>> {
    debug!("Processing image upload for user: {}", user.id);

    let mut file_data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;

    // 处理multipart表单数据
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to process multipart field: {}", e);
        AppError::FileUpload("无法处理上传的文件".to_string())
    })? {
        let field_name = field.name().unwrap_or("");

        if field_name == "file" {
            filename = field.file_name().map(|s| s.to_string());
            content_type = field.content_type().map(|s| s.to_string());

            let data = field.bytes().await.map_err(|e| {
                error!("Failed to read file data: {}", e);
                AppError::FileUpload("无法读取文件数据".to_string())
            })?;

            file_data = Some(data.to_vec());
            break;
        }
    }

    let file_data = file_data.ok_or_else(|| AppError::FileUpload("未找到上传的文件".to_string()))?;
    let filename = filename.unwrap_or_else(|| "unnamed".to_string());
    let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    let url = app_state
        .image_service
        .upload_image(&filename, &content_type, file_data)
        .await?;

    info!("Uploaded image {} for user {}", filename, user.id);

    Ok(Json(json!({
        "success": true,
        "data": { "url": url }
    })))
}
