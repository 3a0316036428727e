use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::error::DbError;
use crate::pool::wrapper::sql_preview;
use crate::udbc::connection::Connection;
use crate::udbc::value::{Row, Value};

/// A scoped statement handle over a checked-out connection.
///
/// The cursor mutably borrows its connection, so nothing else can run on it
/// until the cursor goes out of scope; buffered rows are dropped with it on
/// every exit path. Statements run through a cursor are not committed
/// implicitly.
pub struct Cursor<'a> {
    conn: &'a mut dyn Connection,
    rows: VecDeque<Row>,
    rowcount: u64,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(conn: &'a mut dyn Connection) -> Self {
        Self {
            conn,
            rows: VecDeque::new(),
            rowcount: 0,
        }
    }

    /// Runs a read statement, replacing any unread rows. Returns the row count.
    pub async fn query(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let rows = self.conn.query(sql, params).await.map_err(|source| DbError::Query {
            sql: sql.to_string(),
            param_count: params.len(),
            source,
        })?;
        self.rowcount = rows.len() as u64;
        self.rows = rows.into();
        debug!(sql = sql_preview(sql), rows = self.rowcount, "cursor query executed");
        Ok(self.rowcount)
    }

    /// Runs a write statement. Returns the affected row count.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let affected = self.conn.execute(sql, params).await.map_err(|source| DbError::Update {
            sql: sql.to_string(),
            param_count: params.len(),
            source,
        })?;
        self.rows.clear();
        self.rowcount = affected;
        debug!(sql = sql_preview(sql), affected, "cursor statement executed");
        Ok(affected)
    }

    pub fn fetch_one(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    pub fn fetch_many(&mut self, size: usize) -> Vec<Row> {
        let n = size.min(self.rows.len());
        self.rows.drain(..n).collect()
    }

    pub fn fetch_all(&mut self) -> Vec<Row> {
        self.rows.drain(..).collect()
    }

    /// Rows returned by the last query, or rows affected by the last write.
    pub fn rowcount(&self) -> u64 {
        self.rowcount
    }

    pub fn last_insert_id(&self) -> Option<u64> {
        self.conn.last_insert_id()
    }
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        if !self.rows.is_empty() {
            trace!(unread = self.rows.len(), "cursor dropped with unread rows");
        }
    }
}
