use std::sync::LazyLock;

use dashmap::DashMap;
use tracing::info;

use crate::executor::session::Session;
#[cfg(feature = "mysql")]
use crate::{error::DbError, models::db_config::{ConnectionDescriptor, PoolOptions}};

// 全局单例（Rust 1.80+ 推荐）
pub static DB: LazyLock<PoolManager> = LazyLock::new(PoolManager::new);

/// 获取全局 PoolManager 实例
pub fn pool_mgr() -> &'static PoolManager {
    &DB
}

/// Named pools shared across a process.
#[derive(Default)]
pub struct PoolManager {
    sessions: DashMap<String, Session>,
}

impl PoolManager {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Registers `session` under `name`, returning the one it replaces.
    pub fn register(&self, name: &str, session: Session) -> Option<Session> {
        self.sessions.insert(name.to_string(), session)
    }

    /// 注册 MySQL 数据库连接池
    #[cfg(feature = "mysql")]
    pub async fn connect(
        &self,
        name: &str,
        descriptor: ConnectionDescriptor,
        options: PoolOptions,
    ) -> Result<Session, DbError> {
        let session = Session::connect(descriptor, options).await?;
        self.register(name, session.clone());
        Ok(session)
    }

    pub fn session(&self, name: &str) -> Option<Session> {
        self.sessions.get(name).map(|v| v.value().clone())
    }

    /// Unregisters a pool without closing it.
    pub fn remove(&self, name: &str) -> Option<Session> {
        self.sessions.remove(name).map(|(_, session)| session)
    }

    pub fn names(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Closes and unregisters every pool.
    pub async fn close_all(&self) {
        let sessions: Vec<(String, Session)> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        for (name, session) in sessions {
            self.sessions.remove(&name);
            session.close_all_connections().await;
            info!(pool = %name, "pool closed and unregistered");
        }
    }
}
