//! Resolves a [`ConnectionDescriptor`] from the sources a deployment may use:
//! explicit builder calls, a JSON-like map, a JSON file, or `MYSQL_*` environment variables.
//! The pool itself only ever sees the resolved descriptor.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::models::db_config::{ConnectionDescriptor, DEFAULT_CHARSET, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_USER};

pub const ENV_HOST: &str = "MYSQL_HOST";
pub const ENV_PORT: &str = "MYSQL_PORT";
pub const ENV_USER: &str = "MYSQL_USER";
pub const ENV_PASSWORD: &str = "MYSQL_PASSWORD";
pub const ENV_DATABASE: &str = "MYSQL_DATABASE";
pub const ENV_CHARSET: &str = "MYSQL_CHARSET";
pub const ENV_CONNECT_TIMEOUT: &str = "MYSQL_CONNECT_TIMEOUT";

/// Keys a configuration file must define.
pub const REQUIRED_FILE_KEYS: [&str; 4] = ["host", "user", "password", "database"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Config is missing required key: {0}")]
    MissingField(String),
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Builds a descriptor from a JSON object; absent keys take their defaults.
pub fn from_map(map: &Map<String, JsonValue>) -> Result<ConnectionDescriptor, ConfigError> {
    let descriptor: ConnectionDescriptor = serde_json::from_value(JsonValue::Object(map.clone()))?;
    debug!(descriptor = ?descriptor, "connection descriptor resolved from map");
    Ok(descriptor)
}

/// 从 JSON 配置文件加载连接参数
pub fn from_json_file(path: impl AsRef<Path>) -> Result<ConnectionDescriptor, ConfigError> {
    let path = path.as_ref();
    info!(path = %path.display(), "loading connection config file");
    if !path.exists() {
        error!(path = %path.display(), "config file does not exist");
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let json: JsonValue = serde_json::from_str(&text).inspect_err(|e| {
        error!(path = %path.display(), error = %e, "config file is not valid JSON");
    })?;
    let JsonValue::Object(map) = json else {
        return Err(ConfigError::InvalidValue {
            key: "<root>".into(),
            message: "expected a JSON object".into(),
        });
    };
    if let Some(missing) = REQUIRED_FILE_KEYS.iter().find(|k| !map.contains_key(**k)) {
        error!(path = %path.display(), key = *missing, "config file is missing a required key");
        return Err(ConfigError::MissingField((*missing).to_string()));
    }
    from_map(&map)
}

/// 从环境变量加载连接参数
pub fn from_env() -> Result<ConnectionDescriptor, ConfigError> {
    from_env_with(|key| std::env::var(key).ok())
}

/// Same as [`from_env`], reading variables through `lookup`.
pub fn from_env_with<F>(lookup: F) -> Result<ConnectionDescriptor, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let port = match lookup(ENV_PORT) {
        Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
            key: ENV_PORT.into(),
            message: e.to_string(),
        })?,
        None => DEFAULT_PORT,
    };
    let mut descriptor = ConnectionDescriptor::new()
        .host(lookup(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.into()))
        .port(port)
        .user(lookup(ENV_USER).unwrap_or_else(|| DEFAULT_USER.into()))
        .password(lookup(ENV_PASSWORD).unwrap_or_default())
        .database(lookup(ENV_DATABASE).unwrap_or_default())
        .charset(lookup(ENV_CHARSET).unwrap_or_else(|| DEFAULT_CHARSET.into()));
    if let Some(raw) = lookup(ENV_CONNECT_TIMEOUT) {
        let secs = raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
            key: ENV_CONNECT_TIMEOUT.into(),
            message: e.to_string(),
        })?;
        descriptor = descriptor.connect_timeout(Duration::from_secs(secs));
    }
    debug!(descriptor = ?descriptor, "connection descriptor resolved from environment");
    Ok(descriptor)
}
