#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mypool::error::BoxError;
use mypool::udbc::connection::Connection;
use mypool::udbc::driver::Driver;
use mypool::{ConnectionDescriptor, PoolOptions, Row, Session, Value};

/// Shared server-side state behind every mock connection.
#[derive(Default)]
pub struct MockServer {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub fail_connect: AtomicBool,
    connect_delay_ms: AtomicU64,
    epoch: AtomicU64,
    pub committed: Mutex<Vec<i64>>,
}

impl MockServer {
    /// Every connection opened so far stops answering.
    pub fn kill_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Makes every later connect take `delay` before answering.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.connect_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn committed(&self) -> Vec<i64> {
        self.committed.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub struct MockDriver {
    server: Arc<MockServer>,
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self, _descriptor: &ConnectionDescriptor) -> Result<Box<dyn Connection>, BoxError> {
        let delay = self.server.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.server.fail_connect.load(Ordering::SeqCst) {
            return Err("Can't connect to MySQL server on 'localhost'".into());
        }
        self.server.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            server: self.server.clone(),
            epoch: self.server.epoch.load(Ordering::SeqCst),
            pending: Vec::new(),
            closed: false,
            last_id: None,
        }))
    }
}

struct MockConnection {
    server: Arc<MockServer>,
    epoch: u64,
    pending: Vec<i64>,
    closed: bool,
    last_id: Option<u64>,
}

impl MockConnection {
    fn check(&self) -> Result<(), BoxError> {
        if self.closed || self.epoch < self.server.epoch.load(Ordering::SeqCst) {
            return Err("MySQL server has gone away".into());
        }
        Ok(())
    }
}

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[async_trait]
impl Connection for MockConnection {
    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>, BoxError> {
        self.check()?;
        match sql {
            "SELECT 1" => Ok(vec![row(&[("1", Value::I64(1))])]),
            "SELECT ? AS v" => Ok(vec![row(&[("v", args.first().cloned().unwrap_or(Value::Null))])]),
            "SELECT id, name FROM t ORDER BY id" => {
                let mut ids = self.server.committed();
                ids.extend(self.pending.iter().copied());
                ids.sort();
                Ok(ids
                    .into_iter()
                    .map(|id| row(&[("id", Value::I64(id)), ("name", Value::Str(format!("user-{id}")))]))
                    .collect())
            }
            _ => Err("You have an error in your SQL syntax".into()),
        }
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64, BoxError> {
        self.check()?;
        match sql {
            "INSERT INTO t (id) VALUES (?)" => {
                let id = args
                    .first()
                    .and_then(Value::as_i64)
                    .ok_or("Incorrect integer value")?;
                if self.pending.contains(&id) || self.server.committed().contains(&id) {
                    return Err(format!("Duplicate entry '{id}' for key 'PRIMARY'").into());
                }
                self.pending.push(id);
                self.last_id = Some(id as u64);
                Ok(1)
            }
            _ => Err("You have an error in your SQL syntax".into()),
        }
    }

    fn last_insert_id(&self) -> Option<u64> {
        self.last_id
    }

    async fn begin(&mut self) -> Result<(), BoxError> {
        self.check()
    }

    async fn commit(&mut self) -> Result<(), BoxError> {
        self.check()?;
        let mut committed = self.server.committed.lock().unwrap();
        committed.extend(self.pending.drain(..));
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), BoxError> {
        self.check()?;
        self.pending.clear();
        self.server.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), BoxError> {
        self.check()
    }

    async fn close(&mut self) -> Result<(), BoxError> {
        if !self.closed {
            self.closed = true;
            self.server.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

pub fn mock() -> (Arc<dyn Driver>, Arc<MockServer>) {
    let server = Arc::new(MockServer::default());
    let driver: Arc<dyn Driver> = Arc::new(MockDriver { server: server.clone() });
    (driver, server)
}

pub fn options(min: usize, max: usize) -> PoolOptions {
    PoolOptions::new()
        .min_connections(min)
        .max_connections(max)
        .acquire_timeout(Duration::from_secs(2))
}

pub async fn session(min: usize, max: usize) -> (Session, Arc<MockServer>) {
    let (driver, server) = mock();
    let session = Session::with_driver(driver, ConnectionDescriptor::new(), options(min, max))
        .await
        .expect("mock pool should start");
    (session, server)
}

pub fn row_map(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    row(pairs)
}
