//! Bounded connection pool.
//!
//! Capacity is a fair [`Semaphore`] with `max_connections` permits: every
//! checked-out connection holds one permit, and callers that find the pool
//! exhausted queue on the semaphore in arrival order. The idle/in-use
//! bookkeeping lives behind a single mutex that is never held across an
//! `.await`.

mod cursor;
mod guard;
mod wrapper;

pub use cursor::Cursor;
pub use guard::PooledConnection;
pub use wrapper::ConnectionWrapper;

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use crate::error::DbError;
use crate::models::db_config::{ConnectionDescriptor, PoolOptions};
use crate::udbc::driver::Driver;

/// Lifecycle of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Initializing,
    Ready,
    /// Closed for new checkouts; waiting for in-use connections to come back.
    Draining,
    Closed,
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatus {
    pub state: PoolState,
    pub idle: usize,
    pub in_use: usize,
    /// Every connection the pool owns, including ones being opened.
    pub total: usize,
    pub min_connections: usize,
    pub max_connections: usize,
}

struct Slots {
    state: PoolState,
    idle: VecDeque<ConnectionWrapper>,
    in_use: HashSet<u64>,
    total: usize,
}

pub(crate) struct PoolInner {
    driver: Arc<dyn Driver>,
    descriptor: Arc<ConnectionDescriptor>,
    options: PoolOptions,
    slots: Mutex<Slots>,
    semaphore: Arc<Semaphore>,
    next_id: AtomicU64,
}

/// A shared, cloneable handle to one connection pool.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Builds the pool and eagerly opens `min_connections` connections.
    ///
    /// Any failure while opening the initial connections closes the ones
    /// already opened and is returned; a pool never starts below its floor.
    pub async fn connect(
        driver: Arc<dyn Driver>,
        descriptor: ConnectionDescriptor,
        options: PoolOptions,
    ) -> Result<Self, DbError> {
        options.validate()?;
        let inner = Arc::new(PoolInner {
            driver,
            descriptor: Arc::new(descriptor),
            semaphore: Arc::new(Semaphore::new(options.max_connections)),
            slots: Mutex::new(Slots {
                state: PoolState::Initializing,
                idle: VecDeque::with_capacity(options.max_connections),
                in_use: HashSet::with_capacity(options.max_connections),
                total: 0,
            }),
            options,
            next_id: AtomicU64::new(1),
        });
        inner.initialize().await?;
        Ok(Self { inner })
    }

    /// Checks out a connection, waiting at most the configured acquire timeout.
    pub async fn acquire(&self) -> Result<PooledConnection, DbError> {
        self.inner.acquire(self.inner.options.acquire_timeout).await
    }

    /// Checks out a connection, waiting at most `timeout` when the pool is exhausted.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<PooledConnection, DbError> {
        self.inner.acquire(timeout).await
    }

    /// Returns a connection and waits until it is idle again or discarded.
    ///
    /// A live connection is rolled back before it is parked, so work left
    /// uncommitted by the borrower never reaches the next one.
    pub async fn release(&self, conn: PooledConnection) {
        if !conn.belongs_to(&self.inner) {
            warn!("connection released to a pool it was not acquired from; returning it to its own pool");
        }
        conn.release().await;
    }

    /// Closes idle connections now and the in-use ones as they are released.
    ///
    /// Callers waiting in `acquire` are woken and fail with a "pool closed"
    /// connection error, as does every later `acquire`.
    pub async fn close_all(&self) {
        self.inner.close_all().await;
    }

    pub fn status(&self) -> PoolStatus {
        self.inner.status()
    }

    pub fn options(&self) -> &PoolOptions {
        &self.inner.options
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.inner.descriptor
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("driver", &self.inner.driver.name())
            .field("descriptor", &self.inner.descriptor)
            .field("status", &self.status())
            .finish()
    }
}

/// A slot counted in `total`, and in `in_use` once it has an id. Given back
/// on drop unless committed, so a cancelled checkout cannot shrink the pool.
struct Reservation<'a> {
    pool: &'a PoolInner,
    id: Option<u64>,
    held: bool,
}

impl<'a> Reservation<'a> {
    fn new(pool: &'a PoolInner, id: Option<u64>) -> Self {
        Self { pool, id, held: true }
    }

    fn commit(mut self) {
        self.held = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.held {
            self.pool.forget_slot(self.id);
        }
    }
}

/// The return trip of one checked-out connection.
///
/// Owns the wrapper and its permit until the connection is parked or
/// discarded. Dropped part way (cancelled, or never run because the runtime
/// is gone) it discards the connection synchronously.
pub(crate) struct Checkin {
    pool: Arc<PoolInner>,
    wrapper: Option<ConnectionWrapper>,
    permit: Option<OwnedSemaphorePermit>,
}

impl Checkin {
    pub(crate) fn new(pool: Arc<PoolInner>, wrapper: ConnectionWrapper, permit: Option<OwnedSemaphorePermit>) -> Self {
        Self {
            pool,
            wrapper: Some(wrapper),
            permit,
        }
    }

    pub(crate) async fn run(mut self) {
        let Some(id) = self.wrapper.as_ref().map(ConnectionWrapper::id) else {
            return;
        };
        let state = {
            let slots = self.pool.slots();
            slots.in_use.contains(&id).then_some(slots.state)
        };
        let Some(state) = state else {
            warn!(id, "release of a connection that is not checked out, ignoring");
            self.wrapper = None;
            return;
        };

        if state == PoolState::Ready && self.reset().await && self.park(id) {
            debug!(id, "connection returned to pool");
            return;
        }

        if let Some(wrapper) = self.wrapper.as_mut() {
            wrapper.close().await;
        }
        self.wrapper = None;
        if self.pool.forget_slot(Some(id)) {
            // still holding the permit, so a waiter woken afterwards finds the replacement
            self.pool.replenish().await;
        }
    }

    /// Probes the connection and rolls back whatever transaction the borrower left open.
    async fn reset(&mut self) -> bool {
        let Some(wrapper) = self.wrapper.as_mut() else {
            return false;
        };
        if !wrapper.is_alive().await {
            warn!(id = wrapper.id(), "released connection failed validation, discarding it");
            return false;
        }
        if let Err(e) = wrapper.rollback().await {
            warn!(id = wrapper.id(), error = %e, "rollback on release failed, discarding connection");
            return false;
        }
        true
    }

    fn park(&mut self, id: u64) -> bool {
        let mut slots = self.pool.slots();
        if slots.state != PoolState::Ready {
            return false;
        }
        let Some(wrapper) = self.wrapper.take() else {
            return false;
        };
        slots.in_use.remove(&id);
        slots.idle.push_back(wrapper);
        true
    }
}

impl Drop for Checkin {
    fn drop(&mut self) {
        if let Some(wrapper) = self.wrapper.take() {
            warn!(id = wrapper.id(), "connection dropped before it was checked in, discarding it");
            self.pool.forget_slot(Some(wrapper.id()));
        }
        // the permit goes back only after the slot is settled
        self.permit.take();
    }
}

impl PoolInner {
    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self) -> PoolStatus {
        let slots = self.slots();
        PoolStatus {
            state: slots.state,
            idle: slots.idle.len(),
            in_use: slots.in_use.len(),
            total: slots.total,
            min_connections: self.options.min_connections,
            max_connections: self.options.max_connections,
        }
    }

    async fn open_wrapper(&self) -> Result<ConnectionWrapper, DbError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut wrapper = ConnectionWrapper::new(id, self.driver.clone(), self.descriptor.clone());
        wrapper.connect().await?;
        Ok(wrapper)
    }

    async fn initialize(&self) -> Result<(), DbError> {
        let start = Instant::now();
        let min = self.options.min_connections;
        let mut opened = Vec::with_capacity(min);
        for i in 0..min {
            match self.open_wrapper().await {
                Ok(wrapper) => {
                    debug!(n = i + 1, min, "initial connection opened");
                    opened.push(wrapper);
                }
                Err(e) => {
                    error!(n = i + 1, min, error = %e, "connection pool initialization failed");
                    for mut wrapper in opened {
                        wrapper.close().await;
                    }
                    self.slots().state = PoolState::Closed;
                    return Err(e);
                }
            }
        }
        {
            let mut slots = self.slots();
            slots.total = opened.len();
            slots.idle.extend(opened);
            slots.state = PoolState::Ready;
        }
        info!(
            driver = self.driver.name(),
            descriptor = ?self.descriptor,
            min_connections = min,
            max_connections = self.options.max_connections,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "connection pool initialized"
        );
        Ok(())
    }

    async fn acquire(self: &Arc<Self>, timeout: Duration) -> Result<PooledConnection, DbError> {
        if self.slots().state != PoolState::Ready {
            return Err(DbError::pool_closed());
        }
        let start = Instant::now();
        let permit = match tokio::time::timeout(timeout, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(DbError::pool_closed()),
            Err(_) => {
                let status = self.status();
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    in_use = status.in_use,
                    max_connections = status.max_connections,
                    "connection pool exhausted"
                );
                return Err(DbError::PoolExhausted { timeout });
            }
        };

        let (mut reservation, idle) = {
            let mut slots = self.slots();
            if slots.state != PoolState::Ready {
                return Err(DbError::pool_closed());
            }
            match slots.idle.pop_front() {
                Some(wrapper) => {
                    slots.in_use.insert(wrapper.id());
                    (Reservation::new(self, Some(wrapper.id())), Some(wrapper))
                }
                None if slots.total < self.options.max_connections => {
                    slots.total += 1;
                    (Reservation::new(self, None), None)
                }
                // Every slot holds either an idle connection or a permit, and
                // this caller holds a free permit.
                None => {
                    error!(total = slots.total, "no free slot behind an acquired permit");
                    return Err(DbError::PoolExhausted { timeout });
                }
            }
        };

        let wrapper = match idle {
            Some(mut wrapper) => {
                if wrapper.is_alive().await {
                    wrapper
                } else {
                    warn!(id = wrapper.id(), "idle connection failed validation, replacing it");
                    wrapper.close().await;
                    self.slots().in_use.remove(&wrapper.id());
                    reservation.id = None;
                    self.open_reserved(&mut reservation).await?
                }
            }
            None => self.open_reserved(&mut reservation).await?,
        };
        reservation.commit();

        debug!(
            id = wrapper.id(),
            waited_ms = start.elapsed().as_millis() as u64,
            "connection acquired"
        );
        Ok(PooledConnection::new(wrapper, permit, self.clone()))
    }

    /// Opens a connection into `reservation`'s slot and marks it in use.
    async fn open_reserved(&self, reservation: &mut Reservation<'_>) -> Result<ConnectionWrapper, DbError> {
        let mut wrapper = self.open_wrapper().await?;
        let accepted = {
            let mut slots = self.slots();
            if slots.state == PoolState::Ready {
                slots.in_use.insert(wrapper.id());
                true
            } else {
                false
            }
        };
        if accepted {
            reservation.id = Some(wrapper.id());
            Ok(wrapper)
        } else {
            wrapper.close().await;
            Err(DbError::pool_closed())
        }
    }

    /// Drops one connection from the count, finishing a drain when it was the
    /// last. Returns whether a ready pool is now below its floor.
    fn forget_slot(&self, id: Option<u64>) -> bool {
        let mut slots = self.slots();
        if let Some(id) = id {
            slots.in_use.remove(&id);
        }
        slots.total = slots.total.saturating_sub(1);
        if slots.state == PoolState::Draining && slots.total == 0 {
            slots.state = PoolState::Closed;
            info!("connection pool closed");
        }
        slots.state == PoolState::Ready && slots.total < self.options.min_connections
    }

    /// Opens one idle connection when the pool has fallen below its floor.
    /// Failures are logged; the caller's operation has already finished.
    async fn replenish(&self) {
        let reservation = {
            let mut slots = self.slots();
            if slots.state != PoolState::Ready || slots.total >= self.options.min_connections {
                return;
            }
            slots.total += 1;
            Reservation::new(self, None)
        };

        let mut wrapper = match self.open_wrapper().await {
            Ok(wrapper) => wrapper,
            Err(e) => {
                error!(error = %e, "failed to open replacement connection");
                return;
            }
        };
        if !wrapper.is_alive().await {
            error!(id = wrapper.id(), "replacement connection failed validation");
            wrapper.close().await;
            return;
        }
        let id = wrapper.id();
        let rejected = {
            let mut slots = self.slots();
            if slots.state == PoolState::Ready {
                slots.idle.push_back(wrapper);
                None
            } else {
                Some(wrapper)
            }
        };
        match rejected {
            None => {
                reservation.commit();
                info!(id, "replacement connection added to pool");
            }
            Some(mut wrapper) => wrapper.close().await,
        }
    }

    async fn close_all(&self) {
        let idle: Vec<ConnectionWrapper> = {
            let mut slots = self.slots();
            if matches!(slots.state, PoolState::Draining | PoolState::Closed) {
                return;
            }
            let idle: Vec<_> = slots.idle.drain(..).collect();
            slots.total = slots.total.saturating_sub(idle.len());
            slots.state = if slots.total == 0 {
                PoolState::Closed
            } else {
                PoolState::Draining
            };
            idle
        };
        // wakes every waiter in acquire
        self.semaphore.close();
        info!(idle = idle.len(), "closing connection pool");

        let count = idle.len();
        for mut wrapper in idle {
            wrapper.close().await;
        }
        let status = self.status();
        info!(
            closed = count,
            in_use = status.in_use,
            state = ?status.state,
            "idle connections closed"
        );
    }
}
