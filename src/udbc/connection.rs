use crate::error::BoxError;
use crate::udbc::value::{Row, Value};
use async_trait::async_trait;

/// One live database session as exposed by a driver.
///
/// Errors are returned unclassified; the pool decides whether a failure is a
/// query, update or connection error.
#[async_trait]
pub trait Connection: Send {
    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>, BoxError>;

    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64, BoxError>;

    fn last_insert_id(&self) -> Option<u64>;

    // ---------- transaction ----------
    async fn begin(&mut self) -> Result<(), BoxError>;
    async fn commit(&mut self) -> Result<(), BoxError>;
    async fn rollback(&mut self) -> Result<(), BoxError>;

    // ---------- lifecycle ----------
    /// Lightweight round trip used as the liveness probe.
    async fn ping(&mut self) -> Result<(), BoxError>;
    async fn close(&mut self) -> Result<(), BoxError>;
}
