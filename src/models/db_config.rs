use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::config::ConfigError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_CHARSET: &str = "utf8mb4";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved parameters for opening one database connection.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: String,
    /// 连接超时时间（秒）
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for ConnectionDescriptor {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            database: String::new(),
            charset: DEFAULT_CHARSET.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ConnectionDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

// Password never reaches logs.
impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"******")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("connect_timeout must be a non-negative number of seconds"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

/// Sizing and waiting policy of a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    pub min_connections: usize, // 最小连接数
    pub max_connections: usize, // 最大连接数
    pub acquire_timeout: Duration, // 获取连接的默认等待时间
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            min_connections: 5,
            max_connections: 20,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_connections(mut self, min_connections: usize) -> Self {
        self.min_connections = min_connections;
        self
    }

    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_connections == 0 || self.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                key: "min_connections/max_connections".into(),
                message: "pool bounds must be greater than zero".into(),
            });
        }
        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue {
                key: "min_connections".into(),
                message: format!(
                    "min_connections ({}) exceeds max_connections ({})",
                    self.min_connections, self.max_connections
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_masks_password() {
        let d = ConnectionDescriptor::new().user("app").password("s3cret");
        let text = format!("{:?}", d);
        assert!(text.contains("******"));
        assert!(!text.contains("s3cret"));
    }

    #[test]
    fn pool_options_bounds() {
        assert!(PoolOptions::new().validate().is_ok());
        assert!(PoolOptions::new().min_connections(0).validate().is_err());
        assert!(PoolOptions::new().min_connections(4).max_connections(2).validate().is_err());
        assert!(PoolOptions::new().min_connections(2).max_connections(2).validate().is_ok());
    }
}
