use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Params, Row as MyRow};

use crate::error::BoxError;
use crate::udbc::connection::Connection;
use crate::udbc::value::{Row, Value};
use crate::udbc_mysql::value_codec::{from_mysql_value, to_mysql_value};

pub struct MysqlConnection {
    conn: Option<Conn>,
}

impl MysqlConnection {
    pub fn new(conn: Conn) -> Self {
        Self { conn: Some(conn) }
    }

    fn conn(&mut self) -> Result<&mut Conn, BoxError> {
        self.conn.as_mut().ok_or_else(|| "connection already closed".into())
    }

    fn params(args: &[Value]) -> Params {
        if args.is_empty() {
            Params::Empty
        } else {
            Params::Positional(args.iter().map(to_mysql_value).collect())
        }
    }

    fn map_row(row: MyRow) -> Row {
        let cols = row.columns_ref();
        let mut out = Row::with_capacity(row.len());
        for (i, column) in cols.iter().enumerate() {
            let value = row
                .as_ref(i)
                .map(|v| from_mysql_value(v, Some(column)))
                .unwrap_or(Value::Null);
            out.insert(column.name_str().to_string(), value);
        }
        out
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>, BoxError> {
        let rows: Vec<MyRow> = self.conn()?.exec(sql, Self::params(args)).await?;
        Ok(rows.into_iter().map(Self::map_row).collect())
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64, BoxError> {
        let conn = self.conn()?;
        conn.exec_drop(sql, Self::params(args)).await?;
        Ok(conn.affected_rows())
    }

    fn last_insert_id(&self) -> Option<u64> {
        self.conn.as_ref().and_then(|c| c.last_insert_id())
    }

    async fn begin(&mut self) -> Result<(), BoxError> {
        self.conn()?.query_drop("BEGIN").await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), BoxError> {
        self.conn()?.query_drop("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), BoxError> {
        self.conn()?.query_drop("ROLLBACK").await?;
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), BoxError> {
        self.conn()?.ping().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BoxError> {
        if let Some(conn) = self.conn.take() {
            conn.disconnect().await?;
        }
        Ok(())
    }
}
