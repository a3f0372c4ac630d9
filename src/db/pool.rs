//! Bounded connection pool with a strict FIFO wait queue.
//!
//! Connection records are minted on acquisition and discarded on release;
//! only the slot is reused. A slot freed while callers are waiting goes to
//! the oldest waiter as a fresh record without passing through `available`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use jiff::Timestamp;
use serde::Serialize;
use tokio::sync::{Notify, oneshot};
use tokio::time::Instant;

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};
use crate::utils::SimulatedLatency;

/// Pool construction options
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_size: usize,
    pub connection_timeout: Duration,
    pub query_latency: SimulatedLatency,
}

impl From<&DatabaseConfig> for PoolOptions {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_size: config.pool_size,
            connection_timeout: config.connection_timeout(),
            query_latency: SimulatedLatency::with_jitter(
                config.query_latency_ms,
                config.query_jitter_ms,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Active,
    Idle,
    IdleInTransaction,
}

/// Bookkeeping record of one handed-out connection
#[derive(Debug, Clone)]
struct ConnectionInfo {
    pub id: u64,
    pub state: ConnectionState,
    pub acquired_at: Timestamp,
    pub query_count: u64,
    pub transaction_id: Option<String>,
}

impl ConnectionInfo {
    fn fresh(id: u64) -> Self {
        Self {
            id,
            state: ConnectionState::Active,
            acquired_at: Timestamp::now(),
            query_count: 0,
            transaction_id: None,
        }
    }
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub active: usize,
    pub available: usize,
    pub waiting: usize,
    pub idle_in_transaction: usize,
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<ConnectionInfo>,
}

struct PoolState {
    available: usize,
    outstanding: HashMap<u64, ConnectionInfo>,
    waiters: VecDeque<Waiter>,
    closed: bool,
    next_connection_id: u64,
    next_waiter_id: u64,
}

impl PoolState {
    fn mint(&mut self) -> ConnectionInfo {
        self.next_connection_id += 1;
        ConnectionInfo::fresh(self.next_connection_id)
    }

    fn remove_waiter(&mut self, waiter_id: u64) -> bool {
        match self.waiters.iter().position(|w| w.id == waiter_id) {
            Some(position) => {
                self.waiters.remove(position);
                true
            }
            None => false,
        }
    }
}

/// Queue ticket of an in-flight `acquire`.
///
/// If the acquiring future is dropped mid-wait, the ticket leaves the queue,
/// or returns the slot when one was already handed over.
struct PendingAcquire<'a> {
    pool: &'a ResourcePool,
    waiter_id: u64,
    rx: oneshot::Receiver<ConnectionInfo>,
    settled: bool,
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.pool.lock();
        if state.remove_waiter(self.waiter_id) {
            self.pool.trace_usage(&state);
            return;
        }
        drop(state);

        if let Ok(info) = self.rx.try_recv() {
            tracing::debug!(connection_id = info.id, "Returning slot of cancelled acquire");
            self.pool.release_slot(info.id);
        }
    }
}

struct PoolInner {
    options: PoolOptions,
    state: Mutex<PoolState>,
    drained: Notify,
}

/// Shared handle to the pool; clones refer to the same slots.
#[derive(Clone)]
pub struct ResourcePool {
    inner: Arc<PoolInner>,
}

impl ResourcePool {
    pub fn new(options: PoolOptions) -> Self {
        tracing::info!(
            pool_size = options.max_size,
            connection_timeout_ms = options.connection_timeout.as_millis() as u64,
            "Connection pool initialized"
        );

        let state = PoolState {
            available: options.max_size,
            outstanding: HashMap::new(),
            waiters: VecDeque::new(),
            closed: false,
            next_connection_id: 0,
            next_waiter_id: 0,
        };

        Self {
            inner: Arc::new(PoolInner {
                options,
                state: Mutex::new(state),
                drained: Notify::new(),
            }),
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(PoolOptions::from(config))
    }

    pub fn max_size(&self) -> usize {
        self.inner.options.max_size
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // Critical sections never panic, so a poisoned lock still holds consistent state
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take a slot, waiting in FIFO order up to the connection timeout.
    ///
    /// # Errors
    ///
    /// - `AppError::PoolTimeout` if no slot is handed over before the deadline
    /// - `AppError::PoolClosed` if the pool is closed before or while waiting
    pub async fn acquire(&self) -> AppResult<PooledConnection> {
        let started = Instant::now();

        let (waiter_id, rx) = {
            let mut state = self.lock();
            if state.closed {
                return Err(AppError::PoolClosed);
            }

            if state.available > 0 {
                state.available -= 1;
                let info = state.mint();
                state.outstanding.insert(info.id, info.clone());
                self.trace_usage(&state);
                return Ok(PooledConnection::new(self.clone(), info));
            }

            state.next_waiter_id += 1;
            let waiter_id = state.next_waiter_id;
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(Waiter { id: waiter_id, tx });
            self.trace_usage(&state);
            (waiter_id, rx)
        };

        let mut pending = PendingAcquire {
            pool: self,
            waiter_id,
            rx,
            settled: false,
        };
        let timeout = self.inner.options.connection_timeout;
        let outcome = tokio::time::timeout(timeout, &mut pending.rx).await;
        pending.settled = true;

        match outcome {
            Ok(Ok(info)) => {
                tracing::debug!(
                    connection_id = info.id,
                    wait_ms = started.elapsed().as_millis() as u64,
                    "Connection acquired after wait"
                );
                Ok(PooledConnection::new(self.clone(), info))
            }
            Ok(Err(_)) => Err(AppError::PoolClosed),
            Err(_) => {
                let mut state = self.lock();
                if state.remove_waiter(waiter_id) {
                    tracing::error!(
                        pool_size = self.inner.options.max_size,
                        available = state.available,
                        wait_queue_depth = state.waiters.len(),
                        wait_time_ms = started.elapsed().as_millis() as u64,
                        "Connection pool timeout"
                    );
                    self.trace_usage(&state);
                    return Err(AppError::PoolTimeout {
                        waited: started.elapsed(),
                        pool_size: self.inner.options.max_size,
                    });
                }
                drop(state);

                // Handed over between the deadline and taking the lock
                match pending.rx.try_recv() {
                    Ok(info) => Ok(PooledConnection::new(self.clone(), info)),
                    Err(_) => Err(AppError::PoolClosed),
                }
            }
        }
    }

    /// Return a slot. The head waiter, if any, receives a brand-new record.
    fn release_slot(&self, connection_id: u64) {
        let mut state = self.lock();
        let Some(released) = state.outstanding.remove(&connection_id) else {
            tracing::warn!(connection_id, "Release of unknown connection ignored");
            return;
        };

        if released.state == ConnectionState::IdleInTransaction {
            tracing::debug!(
                connection_id,
                transaction_id = ?released.transaction_id,
                "Connection released while in transaction"
            );
        }

        loop {
            let Some(waiter) = state.waiters.pop_front() else {
                state.available += 1;
                break;
            };

            let info = state.mint();
            match waiter.tx.send(info.clone()) {
                Ok(()) => {
                    // Sent under the lock, so the record is tracked before the waiter can use it
                    state.outstanding.insert(info.id, info);
                    break;
                }
                Err(_) => {
                    tracing::debug!(waiter_id = waiter.id, "Skipping abandoned waiter");
                }
            }
        }

        self.trace_usage(&state);
        if state.outstanding.is_empty() {
            self.inner.drained.notify_waiters();
        }
    }

    fn update_connection(&self, info: &ConnectionInfo) {
        let mut state = self.lock();
        if let Some(entry) = state.outstanding.get_mut(&info.id) {
            entry.state = info.state;
            entry.query_count = info.query_count;
            entry.transaction_id = info.transaction_id.clone();
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        Self::stats_of(self.inner.options.max_size, &state)
    }

    fn stats_of(total: usize, state: &PoolState) -> PoolStats {
        PoolStats {
            total,
            active: state.outstanding.len(),
            available: state.available,
            waiting: state.waiters.len(),
            idle_in_transaction: state
                .outstanding
                .values()
                .filter(|c| c.state == ConnectionState::IdleInTransaction)
                .count(),
        }
    }

    /// Emit active count and queue depth as a trace event. There is no
    /// metrics registry; collectors read these from the log stream.
    fn trace_usage(&self, state: &PoolState) {
        let stats = Self::stats_of(self.inner.options.max_size, state);
        tracing::trace!(
            active = stats.active,
            available = stats.available,
            queue_depth = stats.waiting,
            "Pool usage"
        );
    }

    /// Refuse new acquisitions and fail every queued waiter.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let rejected = state.waiters.len();
        // Dropping the senders wakes each waiter with PoolClosed
        state.waiters.clear();
        self.trace_usage(&state);
        tracing::info!(rejected_waiters = rejected, "Connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Wait until every outstanding connection has been returned.
    ///
    /// Returns `false` if connections were still out when `timeout` elapsed.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let outstanding = self.lock().outstanding.len();
            if outstanding == 0 {
                return true;
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                tracing::warn!(outstanding, "Pool drain timed out");
                return false;
            }
        }
    }
}

/// A handed-out connection; returns its slot when dropped.
pub struct PooledConnection {
    pool: ResourcePool,
    info: ConnectionInfo,
    released: bool,
}

impl PooledConnection {
    fn new(pool: ResourcePool, info: ConnectionInfo) -> Self {
        Self {
            pool,
            info,
            released: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.info.id
    }

    pub fn state(&self) -> ConnectionState {
        self.info.state
    }

    pub fn acquired_at(&self) -> Timestamp {
        self.info.acquired_at
    }

    pub fn query_count(&self) -> u64 {
        self.info.query_count
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.info.transaction_id.as_deref()
    }

    pub(crate) fn begin_transaction(&mut self, transaction_id: String) {
        self.info.state = ConnectionState::IdleInTransaction;
        self.info.transaction_id = Some(transaction_id);
        self.pool.update_connection(&self.info);
    }

    pub(crate) fn end_transaction(&mut self) {
        self.info.state = ConnectionState::Idle;
        self.info.transaction_id = None;
        self.pool.update_connection(&self.info);
    }

    /// Run one statement against the backend.
    pub async fn execute(&mut self, statement: &str) -> AppResult<()> {
        let started = Instant::now();
        self.info.query_count += 1;

        self.pool.inner.options.query_latency.wait().await;

        let preview: String = statement.chars().take(50).collect();
        tracing::debug!(
            connection_id = self.info.id,
            duration_ms = started.elapsed().as_millis() as u64,
            query = %preview,
            state = ?self.info.state,
            transaction_id = ?self.info.transaction_id,
            "Query executed"
        );
        Ok(())
    }

    /// Return the slot now instead of at drop.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.pool.release_slot(self.info.id);
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.info.id)
            .field("state", &self.info.state)
            .field("query_count", &self.info.query_count)
            .field("transaction_id", &self.info.transaction_id)
            .finish()
    }
}
