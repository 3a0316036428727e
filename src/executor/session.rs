use crate::error::DbError;
use crate::models::db_config::{ConnectionDescriptor, PoolOptions};
use crate::pool::{Pool, PoolStatus, PooledConnection};
use crate::udbc::driver::Driver;
use crate::udbc::value::{Row, Value};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// 数据库客户端，封装了连接池操作
///
/// Every statement method borrows a connection, runs, and returns the
/// connection before handing back the statement's own result.
#[derive(Clone, Debug)]
pub struct Session {
    pool: Pool,
}

impl Session {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds a pool over `driver` and wraps it.
    pub async fn with_driver(
        driver: Arc<dyn Driver>,
        descriptor: ConnectionDescriptor,
        options: PoolOptions,
    ) -> Result<Self, DbError> {
        Ok(Self::new(Pool::connect(driver, descriptor, options).await?))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    pub async fn execute_query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let start = Instant::now();
        let mut conn = self.pool.acquire().await?;
        let result = conn.execute_query(sql, params).await;
        conn.release().await;
        if let Ok(rows) = &result {
            info!(
                rows = rows.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "query succeeded"
            );
        }
        result
    }

    /// Like [`execute_query`](Self::execute_query), mapping rows onto `R` by column name.
    pub async fn query_as<R: DeserializeOwned>(&self, sql: &str, params: &[Value]) -> Result<Vec<R>, DbError> {
        let start = Instant::now();
        let mut conn = self.pool.acquire().await?;
        let result = conn.query_as(sql, params).await;
        conn.release().await;
        if let Ok(rows) = &result {
            info!(
                rows = rows.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "typed query succeeded"
            );
        }
        result
    }

    pub async fn execute_update(&self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let start = Instant::now();
        let mut conn = self.pool.acquire().await?;
        let result = conn.execute_update(sql, params).await;
        conn.release().await;
        if let Ok(affected) = &result {
            info!(
                affected = *affected,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "update succeeded"
            );
        }
        result
    }

    /// Scoped checkout: the connection goes back to the pool when the
    /// returned guard is dropped, whichever way the scope is left.
    pub async fn connection(&self) -> Result<PooledConnection, DbError> {
        self.pool.acquire().await
    }

    /// Manual checkout for several statements on one connection, such as an
    /// explicit transaction. Pair with [`release_connection`](Self::release_connection).
    pub async fn get_connection(&self) -> Result<PooledConnection, DbError> {
        self.pool.acquire().await
    }

    pub async fn release_connection(&self, conn: PooledConnection) {
        self.pool.release(conn).await;
    }

    pub async fn close_all_connections(&self) {
        self.pool.close_all().await;
    }
}

#[cfg(feature = "mysql")]
impl Session {
    /// Opens a MySQL pool for `descriptor`.
    pub async fn connect(descriptor: ConnectionDescriptor, options: PoolOptions) -> Result<Self, DbError> {
        Self::with_driver(Arc::new(crate::udbc_mysql::MysqlDriver::new()), descriptor, options).await
    }

    /// 从 JSON 配置文件创建连接池
    pub async fn from_config_file(path: impl AsRef<std::path::Path>, options: PoolOptions) -> Result<Self, DbError> {
        let descriptor = crate::config::from_json_file(path)?;
        Self::connect(descriptor, options).await
    }

    /// 从环境变量创建连接池
    pub async fn from_env(options: PoolOptions) -> Result<Self, DbError> {
        let descriptor = crate::config::from_env()?;
        Self::connect(descriptor, options).await
    }
}
