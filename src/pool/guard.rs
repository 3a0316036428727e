use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::OwnedSemaphorePermit;

use crate::pool::{Checkin, PoolInner};
use crate::pool::wrapper::ConnectionWrapper;

/// A connection checked out of a [`Pool`](crate::pool::Pool).
///
/// Dereferences to the [`ConnectionWrapper`]. Dropping the guard returns the
/// connection to its pool, so release happens on every exit path; call
/// [`release`](Self::release) to wait for the return to complete.
pub struct PooledConnection {
    wrapper: Option<ConnectionWrapper>,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<PoolInner>,
    acquired_at: Instant,
}

impl PooledConnection {
    pub(crate) fn new(wrapper: ConnectionWrapper, permit: OwnedSemaphorePermit, pool: Arc<PoolInner>) -> Self {
        Self {
            wrapper: Some(wrapper),
            permit: Some(permit),
            pool,
            acquired_at: Instant::now(),
        }
    }

    /// How long this connection has been checked out.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    pub(crate) fn belongs_to(&self, pool: &Arc<PoolInner>) -> bool {
        Arc::ptr_eq(&self.pool, pool)
    }

    /// Returns the connection to the pool, validating it first.
    pub async fn release(mut self) {
        if let Some(checkin) = self.checkin() {
            checkin.run().await;
        }
    }

    fn checkin(&mut self) -> Option<Checkin> {
        let wrapper = self.wrapper.take()?;
        Some(Checkin::new(self.pool.clone(), wrapper, self.permit.take()))
    }
}

impl Deref for PooledConnection {
    type Target = ConnectionWrapper;

    fn deref(&self) -> &Self::Target {
        self.wrapper
            .as_ref()
            .expect("PooledConnection used after release")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.wrapper
            .as_mut()
            .expect("PooledConnection used after release")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(checkin) = self.checkin() else {
            return;
        };
        // 异步归还；没有运行时则直接丢弃连接（无法探活与回滚）
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(checkin.run());
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("wrapper", &self.wrapper)
            .field("held_for", &self.held_for())
            .finish()
    }
}
