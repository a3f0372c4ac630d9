//! Transaction coordinator.
//!
//! A unit of work runs against one pooled connection between `BEGIN` and
//! `COMMIT`/`ROLLBACK`. Writes are staged on the [`Transaction`] handle and
//! only reach the job table on commit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::TransactionConfig;
use crate::db::pool::{PooledConnection, ResourcePool};
use crate::db::store::JobFilter;
use crate::db::table::{JobTable, ReadVersion};
use crate::error::{AppError, AppResult};
use crate::jobs::models::{ScheduledJob, UpdateScheduledJob};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOptions {
    pub timeout: Duration,
    pub isolation_level: IsolationLevel,
    pub max_retries: u32,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            isolation_level: IsolationLevel::ReadCommitted,
            max_retries: 3,
        }
    }
}

impl From<&TransactionConfig> for TransactionOptions {
    fn from(config: &TransactionConfig) -> Self {
        Self {
            timeout: config.timeout(),
            isolation_level: config.isolation_level,
            max_retries: config.max_retries,
        }
    }
}

impl TransactionOptions {
    pub fn with_isolation_level(mut self, isolation_level: IsolationLevel) -> Self {
        self.isolation_level = isolation_level;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Delay before retry number `attempt` (1-based): `2^attempt × 100ms`
pub fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_millis(2u64.saturating_pow(attempt).saturating_mul(100))
}

/// One boxed step of a batch
pub type BatchOperation<T> =
    Box<dyn for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, AppResult<T>> + Send>;

/// Box a closure as a [`BatchOperation`].
pub fn batch_operation<T, F>(operation: F) -> BatchOperation<T>
where
    F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, AppResult<T>> + Send + 'static,
{
    Box::new(operation)
}

// ============================================================================
// Transaction handle
// ============================================================================

/// Handle passed to a unit of work. Exposes record operations only.
pub struct Transaction {
    id: String,
    isolation_level: IsolationLevel,
    conn: PooledConnection,
    table: Arc<JobTable>,
    reads: HashMap<Uuid, ReadVersion>,
    writes: HashMap<Uuid, Option<ScheduledJob>>,
}

impl Transaction {
    async fn begin(
        mut conn: PooledConnection,
        table: Arc<JobTable>,
        isolation_level: IsolationLevel,
    ) -> AppResult<Self> {
        let id = format!("tx_{}", Uuid::new_v4().simple());
        conn.begin_transaction(id.clone());
        conn.execute(&format!(
            "BEGIN ISOLATION LEVEL {}",
            isolation_level.as_sql()
        ))
        .await?;

        tracing::debug!(
            connection_id = conn.id(),
            transaction_id = %id,
            isolation_level = ?isolation_level,
            "Transaction started"
        );

        Ok(Self {
            id,
            isolation_level,
            conn,
            table,
            reads: HashMap::new(),
            writes: HashMap::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    /// Current view of a row: staged write first, then the table.
    fn current(&mut self, id: Uuid) -> Option<ScheduledJob> {
        if let Some(staged) = self.writes.get(&id) {
            return staged.clone();
        }
        let (version, job) = self.table.read(&id);
        self.reads.entry(id).or_insert(version);
        job
    }

    pub async fn get(&mut self, id: Uuid) -> AppResult<Option<ScheduledJob>> {
        self.conn
            .execute("SELECT * FROM scheduled_jobs WHERE id = $1")
            .await?;
        Ok(self.current(id))
    }

    pub async fn find(&mut self, filter: &JobFilter) -> AppResult<Vec<ScheduledJob>> {
        self.conn
            .execute("SELECT * FROM scheduled_jobs WHERE ...")
            .await?;

        let mut rows: HashMap<Uuid, ScheduledJob> = HashMap::new();
        for (version, job) in self.table.scan() {
            self.reads.entry(job.id).or_insert(Some(version));
            rows.insert(job.id, job);
        }
        for (id, staged) in &self.writes {
            match staged {
                Some(job) => {
                    rows.insert(*id, job.clone());
                }
                None => {
                    rows.remove(id);
                }
            }
        }

        Ok(filter.apply(rows.into_values()))
    }

    pub async fn insert(&mut self, job: ScheduledJob) -> AppResult<ScheduledJob> {
        self.conn
            .execute("INSERT INTO scheduled_jobs (...) VALUES (...)")
            .await?;
        if self.current(job.id).is_some() {
            return Err(AppError::validation(
                "id",
                format!("job {} already exists", job.id),
            ));
        }
        self.writes.insert(job.id, Some(job.clone()));
        Ok(job)
    }

    pub async fn update(
        &mut self,
        id: Uuid,
        changes: UpdateScheduledJob,
    ) -> AppResult<ScheduledJob> {
        self.conn
            .execute("UPDATE scheduled_jobs SET ... WHERE id = $1")
            .await?;
        let mut job = self
            .current(id)
            .ok_or_else(|| AppError::not_found("ScheduledJob", "id", id))?;
        changes.apply(&mut job, Timestamp::now());
        self.writes.insert(id, Some(job.clone()));
        Ok(job)
    }

    pub async fn delete(&mut self, id: Uuid) -> AppResult<bool> {
        self.conn
            .execute("DELETE FROM scheduled_jobs WHERE id = $1")
            .await?;
        let existed = self.current(id).is_some();
        if existed {
            self.writes.insert(id, None);
        }
        Ok(existed)
    }

    /// Reads that must be unchanged at commit under this isolation level
    fn commit_checks(&self) -> HashMap<Uuid, ReadVersion> {
        match self.isolation_level {
            IsolationLevel::ReadUncommitted | IsolationLevel::ReadCommitted => HashMap::new(),
            IsolationLevel::RepeatableRead => self
                .reads
                .iter()
                .filter(|(id, _)| self.writes.contains_key(id))
                .map(|(id, version)| (*id, *version))
                .collect(),
            IsolationLevel::Serializable => self.reads.clone(),
        }
    }

    async fn commit(mut self) -> AppResult<()> {
        let checks = self.commit_checks();
        let writes = std::mem::take(&mut self.writes);
        let write_count = writes.len();

        if let Err(e) = self.table.commit(writes, &checks) {
            self.rollback(&e).await;
            return Err(e);
        }
        self.conn.execute("COMMIT").await?;
        self.conn.end_transaction();

        tracing::debug!(
            connection_id = self.conn.id(),
            transaction_id = %self.id,
            writes = write_count,
            "Transaction committed"
        );
        Ok(())
    }

    async fn rollback(mut self, cause: &AppError) {
        self.writes.clear();
        if let Err(e) = self.conn.execute("ROLLBACK").await {
            tracing::warn!(transaction_id = %self.id, error = %e, "ROLLBACK failed");
        }
        self.conn.end_transaction();

        tracing::error!(
            connection_id = self.conn.id(),
            transaction_id = %self.id,
            error = %cause,
            "Transaction rolled back"
        );
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Runs units of work against the pool and the job table.
#[derive(Clone)]
pub struct TransactionManager {
    pool: ResourcePool,
    table: Arc<JobTable>,
    defaults: TransactionOptions,
}

impl TransactionManager {
    pub fn new(pool: ResourcePool, table: Arc<JobTable>, defaults: TransactionOptions) -> Self {
        Self {
            pool,
            table,
            defaults,
        }
    }

    pub fn defaults(&self) -> &TransactionOptions {
        &self.defaults
    }

    /// Run `work` once in a transaction.
    ///
    /// Commits on success. Any error, or exceeding `options.timeout`, rolls
    /// back. The connection is returned to the pool on every path.
    pub async fn run_transaction<T, F>(&self, options: &TransactionOptions, work: F) -> AppResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, AppResult<T>>,
    {
        let conn = self.pool.acquire().await?;
        let mut tx = Transaction::begin(conn, Arc::clone(&self.table), options.isolation_level).await?;
        let started = Instant::now();

        let outcome = tokio::time::timeout(options.timeout, work(&mut tx)).await;

        match outcome {
            Ok(Ok(value)) => {
                tx.commit().await?;
                tracing::debug!(
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Transaction finished"
                );
                Ok(value)
            }
            Ok(Err(e)) => {
                tx.rollback(&e).await;
                Err(e)
            }
            Err(_) => {
                let e = AppError::TransactionTimeout {
                    transaction_id: tx.id().to_string(),
                    timeout: options.timeout,
                };
                tx.rollback(&e).await;
                Err(e)
            }
        }
    }

    /// Run `work` in a transaction, retrying serialization conflicts and
    /// deadlocks up to `options.max_retries` attempts.
    pub async fn with_transaction<T, F>(&self, options: &TransactionOptions, work: F) -> AppResult<T>
    where
        T: Send,
        F: for<'t> Fn(&'t mut Transaction) -> BoxFuture<'t, AppResult<T>>,
    {
        let max_attempts = options.max_retries.max(1);
        let mut attempt = 1;

        loop {
            match self.run_transaction(options, &work).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transaction_conflict() && attempt < max_attempts => {
                    let delay = retry_backoff(attempt);
                    tracing::warn!(
                        attempt,
                        max_retries = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transaction conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run `operations` in order inside one transaction and collect their results.
    pub async fn batch_in_transaction<T>(&self, operations: Vec<BatchOperation<T>>) -> AppResult<Vec<T>>
    where
        T: Send + 'static,
    {
        self.run_transaction(&self.defaults, move |tx| {
            Box::pin(async move {
                let mut results = Vec::with_capacity(operations.len());
                for operation in operations {
                    results.push(operation(&mut *tx).await?);
                }
                Ok(results)
            })
        })
        .await
    }
}
