use crate::error::BoxError;
use crate::models::db_config::ConnectionDescriptor;
use crate::udbc::connection::Connection;
use crate::udbc::driver::Driver;
use crate::udbc_mysql::connection::MysqlConnection;
use async_trait::async_trait;
use mysql_async::{Conn, OptsBuilder};
use std::time::Instant;
use tracing::debug;

const MYSQL_TYPE: &str = "mysql";

/// Opens plain `mysql_async` connections, one per pool slot.
#[derive(Debug, Default, Clone)]
pub struct MysqlDriver;

impl MysqlDriver {
    pub fn new() -> Self {
        Self
    }

    fn opts(descriptor: &ConnectionDescriptor) -> Result<OptsBuilder, BoxError> {
        if descriptor.charset.is_empty()
            || !descriptor
                .charset
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(format!("invalid charset name: {:?}", descriptor.charset).into());
        }
        let db_name = (!descriptor.database.is_empty()).then(|| descriptor.database.clone());
        Ok(OptsBuilder::default()
            .ip_or_hostname(descriptor.host.clone())
            .tcp_port(descriptor.port)
            .user(Some(descriptor.user.clone()))
            .pass(Some(descriptor.password.clone()))
            .db_name(db_name)
            // 关闭自动提交，由 commit/rollback 控制事务边界
            .setup(vec![
                format!("SET NAMES {}", descriptor.charset),
                "SET autocommit=0".to_string(),
            ]))
    }
}

#[async_trait]
impl Driver for MysqlDriver {
    fn name(&self) -> &str {
        MYSQL_TYPE
    }

    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn Connection>, BoxError> {
        let opts = Self::opts(descriptor)?;
        let start = Instant::now();
        let conn = if descriptor.connect_timeout.is_zero() {
            Conn::new(opts).await?
        } else {
            tokio::time::timeout(descriptor.connect_timeout, Conn::new(opts))
                .await
                .map_err(|_| format!("connect timed out after {:?}", descriptor.connect_timeout))??
        };
        debug!(
            host = %descriptor.host,
            port = descriptor.port,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "mysql connection established"
        );
        Ok(Box::new(MysqlConnection::new(conn)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_injected_charset() {
        let d = ConnectionDescriptor::new().charset("utf8mb4; DROP TABLE x");
        assert!(MysqlDriver::opts(&d).is_err());
        assert!(MysqlDriver::opts(&ConnectionDescriptor::new()).is_ok());
    }
}
