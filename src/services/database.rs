use crate::config::Config;
use crate::error::{AppError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use surrealdb::engine::remote::http::{Client, Http};
use surrealdb::opt::auth::Root;
use surrealdb::{Response, Surreal};
use tracing::{debug, error, info};

/// 数据库服务
#[derive(Clone)]
pub struct Database {
    client: Surreal<Client>,
    pub config: Config,
}

impl Database {
    /// 创建新的数据库实例
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Initializing database connection to {}", config.database_url);

        let client = Surreal::new::<Http>(config.database_url.as_str()).await?;

        client
            .signin(Root {
                username: &config.database_username,
                password: &config.database_password,
            })
            .await?;

        client
            .use_ns(&config.database_namespace)
            .use_db(&config.database_name)
            .await?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match self.client.query("INFO FOR DB").await {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    /// 执行原始SQL查询
    pub async fn query(&self, sql: &str) -> Result<Response> {
        self.client.query(sql).await.map_err(AppError::from)
    }

    /// 执行带参数的查询
    pub async fn query_with_params<P>(&self, sql: &str, params: P) -> Result<Response>
    where
        P: Serialize,
    {
        self.client
            .query(sql)
            .bind(params)
            .await
            .map_err(AppError::from)
    }

    /// 创建记录
    pub async fn create<T>(&self, table: &str, data: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync + Clone + Debug,
    {
        let results: Vec<T> = self
            .client
            .create(table)
            .content(data)
            .await
            .map_err(AppError::from)?;

        results
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("Failed to create record".to_string()))
    }

    /// 通过ID获取单个记录
    pub async fn get_by_id<T>(&self, table: &str, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + Sync + Debug,
    {
        // 获取纯 ID（不带 table 前缀）
        let prefix = format!("{}:", table);
        let pure_id = id.strip_prefix(&prefix).unwrap_or(id);

        // 使用反引号包裹 ID 以避免解析问题
        let query = format!("SELECT * FROM {}:`{}`", table, pure_id);
        debug!("Executing query: {}", query);

        let mut response = self.query(&query).await?;
        let results: Vec<T> = response.take(0)?;
        Ok(results.into_iter().next())
    }

    /// 通过ID使用JSON数据更新记录并返回指定类型
    pub async fn update_by_id_with_json<T>(
        &self,
        table: &str,
        id: &str,
        updates: serde_json::Value,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + Sync + Debug,
    {
        let query = format!("UPDATE {}:`{}` MERGE $updates RETURN AFTER", table, id);
        let mut response = self
            .query_with_params(&query, serde_json::json!({ "updates": updates }))
            .await?;
        let results: Vec<T> = response.take(0)?;
        Ok(results.into_iter().next())
    }

    /// 通过ID删除记录
    /// 删除不存在的记录视为成功（幂等删除约定）
    pub async fn delete_by_id(&self, table: &str, id: &str) -> Result<()> {
        let _: Option<serde_json::Value> = self
            .client
            .delete((table, id))
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
