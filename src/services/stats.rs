use crate::{
    error::Result,
    models::request::RequestStatus,
    services::Database,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct StatsService {
    db: Arc<Database>,
}

/// 管理端仪表盘统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_requests: u64,
    pub under_review: u64,
    pub approved: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub rejected: u64,
    pub cancelled: u64,
    pub requests_last_7_days: u64,
    pub average_rating: f64,
    pub branches: Vec<BranchActivity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchActivity {
    pub branch_code: String,
    pub total: u64,
}

impl StatsService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    /// 聚合仪表盘统计数据
    pub async fn dashboard(&self) -> Result<DashboardStats> {
        debug!("Aggregating dashboard statistics");

        // 按状态分组计数
        let mut response = self
            .db
            .query("SELECT status, count() AS total FROM maintenance_request GROUP BY status")
            .await?;
        let rows: Vec<Value> = response.take(0)?;

        let mut stats = DashboardStats {
            total_requests: 0,
            under_review: 0,
            approved: 0,
            in_progress: 0,
            completed: 0,
            rejected: 0,
            cancelled: 0,
            requests_last_7_days: 0,
            average_rating: 0.0,
            branches: Vec::new(),
        };

        for row in rows {
            let total = row.get("total").and_then(|t| t.as_u64()).unwrap_or(0);
            stats.total_requests += total;
            match row.get("status").and_then(|s| s.as_str()) {
                Some(s) if s == RequestStatus::UnderReview.as_str() => stats.under_review = total,
                Some(s) if s == RequestStatus::Approved.as_str() => stats.approved = total,
                Some(s) if s == RequestStatus::InProgress.as_str() => stats.in_progress = total,
                Some(s) if s == RequestStatus::Completed.as_str() => stats.completed = total,
                Some(s) if s == RequestStatus::Rejected.as_str() => stats.rejected = total,
                Some(s) if s == RequestStatus::Cancelled.as_str() => stats.cancelled = total,
                _ => {}
            }
        }

        // 最近7天新增工单
        let week_ago = Utc::now() - Duration::days(7);
        let mut response = self
            .db
            .query_with_params(
                "SELECT count() AS total FROM maintenance_request WHERE timestamp >= $since GROUP ALL",
                json!({ "since": week_ago }),
            )
            .await?;
        let row: Option<Value> = response.take(0)?;
        stats.requests_last_7_days = row
            .and_then(|v| v.get("total").and_then(|t| t.as_u64()))
            .unwrap_or(0);

        // 已完成工单的平均评分
        let mut response = self
            .db
            .query("SELECT math::mean(rating) AS average FROM maintenance_request WHERE rating != NONE GROUP ALL")
            .await?;
        let row: Option<Value> = response.take(0)?;
        stats.average_rating = row
            .and_then(|v| v.get("average").and_then(|a| a.as_f64()))
            .unwrap_or(0.0);

        // 按门店分组计数
        let mut response = self
            .db
            .query("SELECT branch_code, count() AS total FROM maintenance_request GROUP BY branch_code")
            .await?;
        let rows: Vec<Value> = response.take(0)?;
        stats.branches = rows
            .into_iter()
            .filter_map(|row| {
                let branch_code = row.get("branch_code")?.as_str()?.to_string();
                let total = row.get("total").and_then(|t| t.as_u64()).unwrap_or(0);
                Some(BranchActivity { branch_code, total })
            })
            .collect();

        Ok(stats)
    }
}
