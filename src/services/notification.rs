use crate::{
    error::{AppError, Result},
    models::notification::*,
    services::Database,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct NotificationService {
    db: Arc<Database>,
}

impl NotificationService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    /// 创建通知（仅由工单创建/状态变更触发）
    pub async fn create_notification(
        &self,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        branch_code: &str,
        is_for_manager: bool,
    ) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            message: message.to_string(),
            notification_type,
            timestamp: Utc::now(),
            read: false,
            branch_code: branch_code.to_string(),
            is_for_manager,
        };

        let created: Notification = self.db.create("notification", notification).await?;
        debug!("Created notification {} for branch {}", created.id, created.branch_code);

        Ok(created)
    }

    /// 获取当前用户的通知列表
    /// 店长看到面向管理端的通知，门店用户看到本门店的通知
    pub async fn list_notifications(
        &self,
        branch_code: &str,
        is_manager: bool,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        let query = if is_manager {
            if unread_only {
                r#"
                    SELECT * FROM notification
                    WHERE is_for_manager = true AND read = false
                    ORDER BY timestamp DESC
                    LIMIT $limit
                "#
            } else {
                r#"
                    SELECT * FROM notification
                    WHERE is_for_manager = true
                    ORDER BY timestamp DESC
                    LIMIT $limit
                "#
            }
        } else if unread_only {
            r#"
                SELECT * FROM notification
                WHERE is_for_manager = false AND branch_code = $branch_code AND read = false
                ORDER BY timestamp DESC
                LIMIT $limit
            "#
        } else {
            r#"
                SELECT * FROM notification
                WHERE is_for_manager = false AND branch_code = $branch_code
                ORDER BY timestamp DESC
                LIMIT $limit
            "#
        };

        let mut response = self.db.query_with_params(query, json!({
            "branch_code": branch_code,
            "limit": limit
        })).await?;

        let notifications: Vec<Notification> = response.take(0)?;
        Ok(notifications)
    }

    /// 获取未读通知数量
    pub async fn unread_count(&self, branch_code: &str, is_manager: bool) -> Result<u64> {
        let query = if is_manager {
            r#"
                SELECT count() AS total FROM notification
                WHERE is_for_manager = true AND read = false
                GROUP ALL
            "#
        } else {
            r#"
                SELECT count() AS total FROM notification
                WHERE is_for_manager = false AND branch_code = $branch_code AND read = false
                GROUP ALL
            "#
        };

        let mut response = self.db.query_with_params(query, json!({
            "branch_code": branch_code
        })).await?;

        let row: Option<serde_json::Value> = response.take(0)?;
        Ok(row
            .and_then(|v| v.get("total").and_then(|t| t.as_u64()))
            .unwrap_or(0))
    }

    /// 将单条通知标记为已读
    pub async fn mark_read(
        &self,
        notification_id: &str,
        branch_code: &str,
        is_manager: bool,
    ) -> Result<Notification> {
        let notification: Notification = self
            .db
            .get_by_id("notification", notification_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        // 只能操作自己可见的通知
        let visible = if is_manager {
            notification.is_for_manager
        } else {
            !notification.is_for_manager && notification.branch_code == branch_code
        };

        if !visible {
            return Err(AppError::forbidden("You cannot modify this notification"));
        }

        let updated: Notification = self
            .db
            .update_by_id_with_json("notification", notification_id, json!({ "read": true }))
            .await?
            .ok_or_else(|| AppError::internal("Failed to mark notification as read"))?;

        Ok(updated)
    }

    /// 将当前用户可见的全部通知标记为已读
    pub async fn mark_all_read(&self, branch_code: &str, is_manager: bool) -> Result<()> {
        let query = if is_manager {
            r#"
                UPDATE notification SET read = true
                WHERE is_for_manager = true AND read = false
            "#
        } else {
            r#"
                UPDATE notification SET read = true
                WHERE is_for_manager = false AND branch_code = $branch_code AND read = false
            "#
        };

        self.db.query_with_params(query, json!({
            "branch_code": branch_code
        })).await?;

        debug!("Marked all notifications as read for branch {}", branch_code);
        Ok(())
    }
}
