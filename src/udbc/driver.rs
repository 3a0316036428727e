use crate::error::BoxError;
use crate::models::db_config::ConnectionDescriptor;
use crate::udbc::connection::Connection;
use async_trait::async_trait;

/// Opens connections for a pool. Any client that can connect, run bound
/// statements, commit, roll back and close can back a pool.
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn Connection>, BoxError>;
}
