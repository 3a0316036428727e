pub mod config;
pub mod error;
pub mod executor;
pub mod models;
pub mod pool;
pub mod pool_manager;
pub mod udbc;
#[cfg(feature = "mysql")]
pub mod udbc_mysql;

pub use error::{DbError, ErrorKind};
pub use executor::session::Session;
pub use models::db_config::{ConnectionDescriptor, PoolOptions};
pub use pool::{ConnectionWrapper, Cursor, Pool, PoolState, PoolStatus, PooledConnection};
pub use udbc::{Row, Value, to_values};
