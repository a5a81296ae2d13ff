use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 维修工单状态
/// 正常流程严格向前推进，Rejected/Cancelled 为终止分支
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    UnderReview,
    Approved,
    InProgress,
    Completed,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::UnderReview => "under_review",
            RequestStatus::Approved => "approved",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Rejected | RequestStatus::Cancelled
        )
    }

    /// 状态迁移合法性检查
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (UnderReview, Approved)
                | (UnderReview, Rejected)
                | (UnderReview, Cancelled)
                | (Approved, InProgress)
                | (Approved, Cancelled)
                | (InProgress, Completed)
        )
    }

    /// 提交方只允许在审核前撤单
    pub fn cancellable_by_submitter(&self) -> bool {
        matches!(self, RequestStatus::UnderReview | RequestStatus::Approved)
    }
}

/// 工单优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Low,
    Medium,
    High,
}

impl Default for RequestPriority {
    fn default() -> Self {
        RequestPriority::Medium
    }
}

/// 维修工单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceRequest {
    pub id: String,
    pub branch_code: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: RequestPriority,
    pub status: RequestStatus,
    pub timestamp: DateTime<Utc>,
    pub image_url: Option<String>,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRequestPayload {
    #[validate(length(min = 1, max = 200, message = "标题长度需在1-200个字符之间"))]
    pub title: String,
    #[validate(length(min = 1, max = 2000, message = "描述长度需在1-2000个字符之间"))]
    pub description: String,
    #[validate(length(min = 1, max = 100, message = "类别长度需在1-100个字符之间"))]
    pub category: String,
    #[serde(default)]
    pub priority: RequestPriority,
    #[validate(url(message = "图片地址必须是有效的URL"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: RequestStatus,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RatingPayload {
    #[validate(range(min = 1, max = 5, message = "评分需在1-5之间"))]
    pub rating: u8,
    #[validate(length(max = 1000, message = "反馈不能超过1000个字符"))]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestListQuery {
    pub status: Option<RequestStatus>,
    pub branch_code: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_legal() {
        use RequestStatus::*;
        assert!(UnderReview.can_transition_to(Approved));
        assert!(UnderReview.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
    }

    #[test]
    fn backward_and_skipping_transitions_are_rejected() {
        use RequestStatus::*;
        assert!(!Approved.can_transition_to(UnderReview));
        assert!(!UnderReview.can_transition_to(InProgress));
        assert!(!UnderReview.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Approved));
        assert!(!InProgress.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        use RequestStatus::*;
        for terminal in [Completed, Rejected, Cancelled] {
            for next in [UnderReview, Approved, InProgress, Completed, Rejected, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
            assert!(terminal.is_terminal());
        }
    }

    #[test]
    fn submitter_can_cancel_only_before_work_starts() {
        use RequestStatus::*;
        assert!(UnderReview.cancellable_by_submitter());
        assert!(Approved.cancellable_by_submitter());
        assert!(!InProgress.cancellable_by_submitter());
        assert!(!Completed.cancellable_by_submitter());
        assert!(!Rejected.cancellable_by_submitter());
    }

    #[test]
    fn status_serializes_to_snake_case() {
        let s = serde_json::to_string(&RequestStatus::UnderReview).unwrap();
        assert_eq!(s, "\"under_review\"");
        let s = serde_json::to_string(&RequestStatus::InProgress).unwrap();
        assert_eq!(s, "\"in_progress\"");
        assert_eq!(RequestStatus::Completed.as_str(), "completed");
    }
}
