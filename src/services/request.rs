use crate::{
    error::{AppError, Result},
    models::notification::NotificationType,
    models::request::*,
    services::{Database, NotificationService},
    services::auth::User,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct RequestService {
    db: Arc<Database>,
    notification_service: NotificationService,
}

impl RequestService {
    pub async fn new(db: Arc<Database>, notification_service: NotificationService) -> Result<Self> {
        Ok(Self {
            db,
            notification_service,
        })
    }

    /// 创建维修工单
    /// 同时产生一条面向管理端的通知
    pub async fn create_request(
        &self,
        user: &User,
        payload: CreateRequestPayload,
    ) -> Result<MaintenanceRequest> {
        debug!("Creating maintenance request for branch: {}", user.branch_code);

        payload.validate().map_err(AppError::ValidatorError)?;

        let request = MaintenanceRequest {
            id: Uuid::new_v4().to_string(),
            branch_code: user.branch_code.clone(),
            title: payload.title,
            description: payload.description,
            category: payload.category,
            priority: payload.priority,
            status: RequestStatus::UnderReview,
            timestamp: Utc::now(),
            image_url: payload.image_url,
            rating: None,
            feedback: None,
        };

        let created: MaintenanceRequest = self.db.create("maintenance_request", request).await?;

        // 通知失败不阻塞工单创建
        if let Err(e) = self
            .notification_service
            .create_notification(
                NotificationType::NewRequest,
                "新维修工单",
                &format!("门店 {} 提交了工单：{}", created.branch_code, created.title),
                &created.branch_code,
                true,
            )
            .await
        {
            warn!("Failed to create notification for request {}: {}", created.id, e);
        }

        info!("Created maintenance request {} for branch {}", created.id, created.branch_code);
        Ok(created)
    }

    /// 获取工单列表
    /// 店长可以查看全部门店，门店用户只能查看本门店
    pub async fn list_requests(
        &self,
        user: &User,
        query: RequestListQuery,
        default_limit: usize,
    ) -> Result<Vec<MaintenanceRequest>> {
        let limit = query.limit.unwrap_or(default_limit).min(100);
        let page = query.page.unwrap_or(1).max(1);
        let start = (page - 1) * limit;

        // 非店长强制按本门店过滤
        let branch_filter = if user.is_manager {
            query.branch_code.clone()
        } else {
            Some(user.branch_code.clone())
        };

        let mut conditions = Vec::new();
        if branch_filter.is_some() {
            conditions.push("branch_code = $branch_code");
        }
        if query.status.is_some() {
            conditions.push("status = $status");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT * FROM maintenance_request {} ORDER BY timestamp DESC LIMIT $limit START $start",
            where_clause
        );

        let mut response = self.db.query_with_params(&sql, json!({
            "branch_code": branch_filter,
            "status": query.status,
            "limit": limit,
            "start": start
        })).await?;

        let requests: Vec<MaintenanceRequest> = response.take(0)?;
        Ok(requests)
    }

    /// 获取单个工单
    pub async fn get_request(&self, user: &User, request_id: &str) -> Result<MaintenanceRequest> {
        let request: MaintenanceRequest = self
            .db
            .get_by_id("maintenance_request", request_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Maintenance request not found".to_string()))?;

        if !user.is_manager && request.branch_code != user.branch_code {
            // 对越权访问返回404而不是403，避免暴露工单存在性
            return Err(AppError::NotFound("Maintenance request not found".to_string()));
        }

        Ok(request)
    }

    /// 店长更新工单状态
    /// 只允许合法的前向迁移，同时产生面向门店的状态变更通知
    pub async fn update_status(
        &self,
        user: &User,
        request_id: &str,
        new_status: RequestStatus,
    ) -> Result<MaintenanceRequest> {
        if !user.is_manager {
            return Err(AppError::forbidden("Only managers can update request status"));
        }

        let request = self.get_request(user, request_id).await?;

        if !request.status.can_transition_to(new_status) {
            return Err(AppError::Conflict(format!(
                "Cannot move request from {} to {}",
                request.status.as_str(),
                new_status.as_str()
            )));
        }

        let updated: MaintenanceRequest = self
            .db
            .update_by_id_with_json("maintenance_request", request_id, json!({
                "status": new_status
            }))
            .await?
            .ok_or_else(|| AppError::internal("Failed to update request status"))?;

        if let Err(e) = self
            .notification_service
            .create_notification(
                NotificationType::StatusUpdate,
                "工单状态更新",
                &format!("工单「{}」状态变更为 {}", updated.title, new_status.as_str()),
                &updated.branch_code,
                false,
            )
            .await
        {
            warn!("Failed to create status notification for request {}: {}", request_id, e);
        }

        info!(
            "Request {} moved from {} to {}",
            request_id,
            request.status.as_str(),
            new_status.as_str()
        );
        Ok(updated)
    }

    /// 提交门店撤销工单
    /// 只有提交门店可以撤单，且只能在审核通过前
    pub async fn cancel_request(&self, user: &User, request_id: &str) -> Result<MaintenanceRequest> {
        let request = self.get_request(user, request_id).await?;

        if request.branch_code != user.branch_code {
            return Err(AppError::forbidden("Only the submitting branch can cancel a request"));
        }

        if !request.status.cancellable_by_submitter() {
            return Err(AppError::Conflict(format!(
                "Request in status {} can no longer be cancelled",
                request.status.as_str()
            )));
        }

        let updated: MaintenanceRequest = self
            .db
            .update_by_id_with_json("maintenance_request", request_id, json!({
                "status": RequestStatus::Cancelled
            }))
            .await?
            .ok_or_else(|| AppError::internal("Failed to cancel request"))?;

        if let Err(e) = self
            .notification_service
            .create_notification(
                NotificationType::StatusUpdate,
                "工单已撤销",
                &format!("门店 {} 撤销了工单：{}", updated.branch_code, updated.title),
                &updated.branch_code,
                true,
            )
            .await
        {
            warn!("Failed to create cancellation notification for request {}: {}", request_id, e);
        }

        Ok(updated)
    }

    /// 对已完成的工单评分
    /// 评分只能设置一次，且只在 Completed 状态下允许
    pub async fn rate_request(
        &self,
        user: &User,
        request_id: &str,
        payload: RatingPayload,
    ) -> Result<MaintenanceRequest> {
        payload.validate().map_err(AppError::ValidatorError)?;

        let request = self.get_request(user, request_id).await?;

        if request.branch_code != user.branch_code {
            return Err(AppError::forbidden("Only the submitting branch can rate a request"));
        }

        if request.status != RequestStatus::Completed {
            return Err(AppError::Conflict(
                "Only completed requests can be rated".to_string(),
            ));
        }

        if request.rating.is_some() {
            return Err(AppError::Conflict(
                "This request has already been rated".to_string(),
            ));
        }

        let updated: MaintenanceRequest = self
            .db
            .update_by_id_with_json("maintenance_request", request_id, json!({
                "rating": payload.rating,
                "feedback": payload.feedback
            }))
            .await?
            .ok_or_else(|| AppError::internal("Failed to save rating"))?;

        info!("Request {} rated {} by branch {}", request_id, payload.rating, user.branch_code);
        Ok(updated)
    }
}
