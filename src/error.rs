use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Boxed error produced by a driver implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const POOL_CLOSED: &str = "pool closed";

/// Discriminant of a [`DbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Query,
    Update,
    PoolExhausted,
    Config,
}

/// Represents errors that can occur while using the pool.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("Query error: {source} (sql: {sql}, params: {param_count})")]
    Query {
        sql: String,
        param_count: usize,
        #[source]
        source: BoxError,
    },
    #[error("Update error: {source} (sql: {sql}, params: {param_count})")]
    Update {
        sql: String,
        param_count: usize,
        #[source]
        source: BoxError,
    },
    #[error("Pool exhausted: no connection became available within {timeout:?}")]
    PoolExhausted { timeout: Duration },
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Connection { .. } => ErrorKind::Connection,
            DbError::Query { .. } => ErrorKind::Query,
            DbError::Update { .. } => ErrorKind::Update,
            DbError::PoolExhausted { .. } => ErrorKind::PoolExhausted,
            DbError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn connection(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        DbError::Connection {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub(crate) fn pool_closed() -> Self {
        DbError::Connection {
            message: POOL_CLOSED.to_string(),
            source: None,
        }
    }

    /// True when the error was produced by an operation on a closed pool.
    pub fn is_pool_closed(&self) -> bool {
        matches!(self, DbError::Connection { message, source: None } if message == POOL_CLOSED)
    }

    /// The underlying driver error, if any.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            DbError::Connection { source, .. } => source.as_deref(),
            DbError::Query { source, .. } | DbError::Update { source, .. } => Some(&**source),
            DbError::PoolExhausted { .. } | DbError::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_error_keeps_sql_but_not_values() {
        let err = DbError::Query {
            sql: "SELECT * FROM users WHERE token = ?".into(),
            param_count: 1,
            source: "syntax error".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Query);
        let text = err.to_string();
        assert!(text.contains("SELECT * FROM users"));
        assert!(text.contains("params: 1"));
        assert_eq!(err.cause().map(|c| c.to_string()).as_deref(), Some("syntax error"));
    }

    #[test]
    fn pool_closed_is_a_connection_error() {
        let err = DbError::pool_closed();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(err.is_pool_closed());
        assert_eq!(err.to_string(), "Connection error: pool closed");

        let other = DbError::connection("refused", "io error");
        assert!(!other.is_pool_closed());
    }
}
