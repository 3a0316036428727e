use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::error::DbError;
use crate::models::db_config::ConnectionDescriptor;
use crate::pool::cursor::Cursor;
use crate::udbc::connection::Connection;
use crate::udbc::deserializer::from_row;
use crate::udbc::driver::Driver;
use crate::udbc::value::{Row, Value};

const SQL_PREVIEW_CHARS: usize = 200;

/// First 200 characters of a statement, for log lines.
pub(crate) fn sql_preview(sql: &str) -> &str {
    match sql.char_indices().nth(SQL_PREVIEW_CHARS) {
        Some((idx, _)) => &sql[..idx],
        None => sql,
    }
}

#[derive(Debug, Clone, Copy)]
enum TxControl {
    Begin,
    Commit,
    Rollback,
}

impl TxControl {
    fn as_str(self) -> &'static str {
        match self {
            TxControl::Begin => "BEGIN",
            TxControl::Commit => "COMMIT",
            TxControl::Rollback => "ROLLBACK",
        }
    }
}

/// Owns exactly one driver connection.
///
/// A wrapper is never shared: the pool hands it to one caller at a time,
/// and every operation takes `&mut self`.
pub struct ConnectionWrapper {
    id: u64,
    driver: Arc<dyn Driver>,
    descriptor: Arc<ConnectionDescriptor>,
    conn: Option<Box<dyn Connection>>,
    alive: bool,
    created_at: Instant,
}

impl ConnectionWrapper {
    pub fn new(id: u64, driver: Arc<dyn Driver>, descriptor: Arc<ConnectionDescriptor>) -> Self {
        Self {
            id,
            driver,
            descriptor,
            conn: None,
            alive: false,
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Whether the last known state of the connection is usable, without a round trip.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some() && self.alive
    }

    /// 建立数据库连接；已连接时不做任何事
    pub async fn connect(&mut self) -> Result<(), DbError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let start = Instant::now();
        match self.driver.connect(&self.descriptor).await {
            Ok(conn) => {
                self.conn = Some(conn);
                self.alive = true;
                debug!(
                    id = self.id,
                    driver = self.driver.name(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "database connection opened"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    id = self.id,
                    host = %self.descriptor.host,
                    port = self.descriptor.port,
                    database = %self.descriptor.database,
                    error = %e,
                    "failed to open database connection"
                );
                Err(DbError::connection(
                    format!(
                        "failed to connect to {}:{}/{}",
                        self.descriptor.host, self.descriptor.port, self.descriptor.database
                    ),
                    e,
                ))
            }
        }
    }

    async fn live(&mut self) -> Result<&mut dyn Connection, DbError> {
        self.connect().await?;
        match self.conn.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(DbError::Connection {
                message: "connection is not open".into(),
                source: None,
            }),
        }
    }

    /// Runs a read statement and returns every row in result order.
    pub async fn execute_query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let id = self.id;
        let conn = self.live().await?;
        let start = Instant::now();
        match conn.query(sql, params).await {
            Ok(rows) => {
                debug!(
                    id,
                    sql = sql_preview(sql),
                    rows = rows.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "query executed"
                );
                Ok(rows)
            }
            Err(source) => {
                error!(id, sql = sql_preview(sql), params = params.len(), error = %source, "query failed");
                Err(DbError::Query {
                    sql: sql.to_string(),
                    param_count: params.len(),
                    source,
                })
            }
        }
    }

    /// Runs a read statement and maps each row onto `R` by column name.
    pub async fn query_as<R: DeserializeOwned>(&mut self, sql: &str, params: &[Value]) -> Result<Vec<R>, DbError> {
        let rows = self.execute_query(sql, params).await?;
        rows.iter()
            .map(|row| {
                from_row(row).map_err(|e| DbError::Query {
                    sql: sql.to_string(),
                    param_count: params.len(),
                    source: Box::new(e),
                })
            })
            .collect()
    }

    /// Runs a write statement and commits it.
    ///
    /// On failure the transaction is rolled back; a failed rollback is only
    /// logged and the statement's own error is returned.
    pub async fn execute_update(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let id = self.id;
        let conn = self.live().await?;
        let start = Instant::now();
        let result = match conn.execute(sql, params).await {
            Ok(affected) => conn.commit().await.map(|_| affected),
            Err(e) => Err(e),
        };
        match result {
            Ok(affected) => {
                debug!(
                    id,
                    sql = sql_preview(sql),
                    affected,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "update committed"
                );
                Ok(affected)
            }
            Err(source) => {
                if let Err(rollback_err) = conn.rollback().await {
                    warn!(id, error = %rollback_err, "rollback after failed update did not succeed");
                }
                error!(id, sql = sql_preview(sql), params = params.len(), error = %source, "update failed");
                Err(DbError::Update {
                    sql: sql.to_string(),
                    param_count: params.len(),
                    source,
                })
            }
        }
    }

    // ---------- transaction ----------

    pub async fn begin(&mut self) -> Result<(), DbError> {
        self.control(TxControl::Begin).await
    }

    pub async fn commit(&mut self) -> Result<(), DbError> {
        self.control(TxControl::Commit).await
    }

    pub async fn rollback(&mut self) -> Result<(), DbError> {
        self.control(TxControl::Rollback).await
    }

    async fn control(&mut self, op: TxControl) -> Result<(), DbError> {
        let id = self.id;
        let conn = self.live().await?;
        let result = match op {
            TxControl::Begin => conn.begin().await,
            TxControl::Commit => conn.commit().await,
            TxControl::Rollback => conn.rollback().await,
        };
        result.map_err(|source| {
            error!(id, statement = op.as_str(), error = %source, "transaction control failed");
            DbError::Update {
                sql: op.as_str().to_string(),
                param_count: 0,
                source,
            }
        })
    }

    pub fn last_insert_id(&self) -> Option<u64> {
        self.conn.as_ref().and_then(|c| c.last_insert_id())
    }

    /// Borrows the connection as a cursor; the borrow ends when the cursor is dropped.
    pub async fn cursor(&mut self) -> Result<Cursor<'_>, DbError> {
        let conn = self.live().await?;
        Ok(Cursor::new(conn))
    }

    /// Liveness probe. Never fails; any error means "not alive".
    pub async fn is_alive(&mut self) -> bool {
        let Some(conn) = self.conn.as_deref_mut() else {
            return false;
        };
        match conn.ping().await {
            Ok(()) => {
                self.alive = true;
                true
            }
            Err(e) => {
                debug!(id = self.id, error = %e, "liveness probe failed");
                self.alive = false;
                false
            }
        }
    }

    /// 关闭数据库连接，可重复调用
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            match conn.close().await {
                Ok(()) => debug!(id = self.id, "database connection closed"),
                Err(e) => warn!(id = self.id, error = %e, "error while closing database connection"),
            }
        }
        self.alive = false;
    }
}

impl std::fmt::Debug for ConnectionWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionWrapper")
            .field("id", &self.id)
            .field("driver", &self.driver.name())
            .field("connected", &self.conn.is_some())
            .field("alive", &self.alive)
            .field("age", &self.age())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::sql_preview;

    #[test]
    fn preview_truncates_on_char_boundary() {
        let short = "SELECT 1";
        assert_eq!(sql_preview(short), short);

        let long = "é".repeat(250);
        assert_eq!(sql_preview(&long).chars().count(), 200);
    }
}
