//! Job persistence interface and its pool-backed implementation.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use uuid::Uuid;

use crate::db::pool::ResourcePool;
use crate::db::table::JobTable;
use crate::db::transaction::{IsolationLevel, TransactionManager, TransactionOptions};
use crate::error::{AppError, AppResult};
use crate::jobs::models::{JobStatusCounts, ScheduledJob, UpdateScheduledJob};
use crate::jobs::types::{JobStatus, JobType};

/// Row filter for [`JobStore::find_many`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    /// Only jobs with `next_run_at <= due_before`
    pub due_before: Option<Timestamp>,
    pub customer_id: Option<String>,
    pub job_type: Option<JobType>,
    /// Only jobs with `retry_count < max_retries`
    pub retryable: bool,
    pub limit: Option<usize>,
}

impl JobFilter {
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Scheduled jobs whose run time has arrived
    pub fn due(now: Timestamp) -> Self {
        Self {
            status: Some(JobStatus::Scheduled),
            due_before: Some(now),
            ..Default::default()
        }
    }

    /// Failed jobs that still have retry budget
    pub fn retryable_failures() -> Self {
        Self {
            status: Some(JobStatus::Failed),
            retryable: true,
            ..Default::default()
        }
    }

    pub fn customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn matches(&self, job: &ScheduledJob) -> bool {
        self.status.is_none_or(|status| job.status == status)
            && self.due_before.is_none_or(|due| job.next_run_at <= due)
            && self
                .customer_id
                .as_deref()
                .is_none_or(|customer| job.customer_id == customer)
            && self.job_type.is_none_or(|job_type| job.job_type == job_type)
            && (!self.retryable || job.can_retry())
    }

    /// Keep matching rows, ordered by `next_run_at` then `created_at`.
    pub fn apply(&self, jobs: impl IntoIterator<Item = ScheduledJob>) -> Vec<ScheduledJob> {
        let mut matched: Vec<ScheduledJob> = jobs.into_iter().filter(|j| self.matches(j)).collect();
        matched.sort_by(|a, b| {
            a.next_run_at
                .cmp(&b.next_run_at)
                .then(a.created_at.cmp(&b.created_at))
        });
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

/// Record store for scheduled jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn find_many(&self, filter: &JobFilter) -> AppResult<Vec<ScheduledJob>>;

    async fn get(&self, id: Uuid) -> AppResult<Option<ScheduledJob>>;

    async fn create(&self, job: ScheduledJob) -> AppResult<ScheduledJob>;

    /// Apply `changes` to an existing job; `NotFound` if it does not exist.
    async fn update(&self, id: Uuid, changes: UpdateScheduledJob) -> AppResult<ScheduledJob>;

    /// Delete a job. Returns whether it existed.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    async fn count_by_status(&self) -> AppResult<JobStatusCounts>;
}

/// In-process job table where every operation goes through the pool.
#[derive(Clone)]
pub struct PooledJobStore {
    pool: ResourcePool,
    table: Arc<JobTable>,
    transactions: TransactionManager,
}

impl PooledJobStore {
    pub fn new(pool: ResourcePool, defaults: TransactionOptions) -> Self {
        let table = Arc::new(JobTable::new());
        let transactions = TransactionManager::new(pool.clone(), Arc::clone(&table), defaults);
        Self {
            pool,
            table,
            transactions,
        }
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    /// Updates read-modify-write a row, so they run at least at REPEATABLE
    /// READ and a concurrent patch surfaces as a retried conflict.
    fn update_options(&self) -> TransactionOptions {
        let defaults = self.transactions.defaults().clone();
        match defaults.isolation_level {
            IsolationLevel::ReadUncommitted | IsolationLevel::ReadCommitted => {
                defaults.with_isolation_level(IsolationLevel::RepeatableRead)
            }
            _ => defaults,
        }
    }
}

#[async_trait]
impl JobStore for PooledJobStore {
    async fn find_many(&self, filter: &JobFilter) -> AppResult<Vec<ScheduledJob>> {
        let mut conn = self.pool.acquire().await?;
        conn.execute("SELECT * FROM scheduled_jobs WHERE ...").await?;

        let jobs = self.table.scan().into_iter().map(|(_, job)| job);
        Ok(filter.apply(jobs))
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<ScheduledJob>> {
        let mut conn = self.pool.acquire().await?;
        conn.execute("SELECT * FROM scheduled_jobs WHERE id = $1").await?;

        Ok(self.table.read(&id).1)
    }

    async fn create(&self, job: ScheduledJob) -> AppResult<ScheduledJob> {
        let options = self.transactions.defaults().clone();
        let job = self
            .transactions
            .run_transaction(&options, move |tx| Box::pin(async move { tx.insert(job).await }))
            .await?;

        tracing::debug!(
            job_id = %job.id,
            job_type = %job.job_type,
            customer_id = %job.customer_id,
            "Job row inserted"
        );
        Ok(job)
    }

    async fn update(&self, id: Uuid, changes: UpdateScheduledJob) -> AppResult<ScheduledJob> {
        let options = self.update_options();
        self.transactions
            .with_transaction(&options, |tx| {
                let changes = changes.clone();
                Box::pin(async move { tx.update(id, changes).await })
            })
            .await
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let options = self.transactions.defaults().clone();
        self.transactions
            .run_transaction(&options, move |tx| Box::pin(async move { tx.delete(id).await }))
            .await
    }

    async fn count_by_status(&self) -> AppResult<JobStatusCounts> {
        let mut conn = self.pool.acquire().await?;
        conn.execute("SELECT status, COUNT(*) FROM scheduled_jobs GROUP BY status")
            .await?;

        let mut counts = JobStatusCounts::default();
        for (_, job) in self.table.scan() {
            counts.record(job.status);
        }
        Ok(counts)
    }
}

/// Fetch a job or fail with `NotFound`
pub async fn get_existing(store: &dyn JobStore, id: Uuid) -> AppResult<ScheduledJob> {
    store
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("ScheduledJob", "id", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::PoolOptions;
    use crate::jobs::models::NewScheduledJob;
    use crate::jobs::types::JobPayload;
    use crate::utils::SimulatedLatency;
    use jiff::ToSpan;
    use std::time::Duration;

    fn store(pool_size: usize) -> PooledJobStore {
        let pool = ResourcePool::new(PoolOptions {
            max_size: pool_size,
            connection_timeout: Duration::from_secs(1),
            query_latency: SimulatedLatency::ZERO,
        });
        PooledJobStore::new(pool, TransactionOptions::default())
    }

    fn new_job(customer: &str, run_at: Timestamp) -> ScheduledJob {
        NewScheduledJob {
            job_type: JobType::DataSync,
            customer_id: customer.to_string(),
            next_run_at: run_at,
            max_retries: 2,
            payload: JobPayload::new(),
        }
        .into_job(Timestamp::now())
    }

    #[tokio::test(start_paused = true)]
    async fn create_get_update_delete() {
        let store = store(2);
        let job = store
            .create(new_job("cust_a", Timestamp::now()))
            .await
            .unwrap();

        let fetched = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(fetched, job);

        let updated = store
            .update(job.id, UpdateScheduledJob::status(JobStatus::Running))
            .await
            .unwrap();
        assert_eq!(updated.status, JobStatus::Running);
        assert!(updated.updated_at >= job.updated_at);

        assert!(store.delete(job.id).await.unwrap());
        assert!(!store.delete(job.id).await.unwrap());
        assert!(store.get(job.id).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn update_of_missing_job_is_not_found() {
        let store = store(1);
        let result = store
            .update(Uuid::new_v4(), UpdateScheduledJob::status(JobStatus::Failed))
            .await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
        assert!(matches!(
            get_existing(&store, Uuid::new_v4()).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn due_filter_selects_past_scheduled_jobs_in_order() {
        let store = store(2);
        let now = Timestamp::now();
        let later = store.create(new_job("c", now + 2.hours())).await.unwrap();
        let oldest = store.create(new_job("c", now - 2.hours())).await.unwrap();
        let recent = store.create(new_job("c", now - 1.hour())).await.unwrap();

        let due = store.find_many(&JobFilter::due(now)).await.unwrap();
        let ids: Vec<Uuid> = due.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![oldest.id, recent.id]);
        assert!(!ids.contains(&later.id));
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_filter_respects_budget() {
        let store = store(2);
        let now = Timestamp::now();
        let spent = store.create(new_job("c", now)).await.unwrap();
        let fresh = store.create(new_job("c", now)).await.unwrap();

        for (id, retry_count) in [(spent.id, 2), (fresh.id, 1)] {
            store
                .update(
                    id,
                    UpdateScheduledJob {
                        status: Some(JobStatus::Failed),
                        retry_count: Some(retry_count),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let retryable = store
            .find_many(&JobFilter::retryable_failures())
            .await
            .unwrap();
        assert_eq!(retryable.len(), 1);
        assert_eq!(retryable[0].id, fresh.id);
    }

    #[tokio::test(start_paused = true)]
    async fn counts_jobs_per_status() {
        let store = store(2);
        let now = Timestamp::now();
        let a = store.create(new_job("c", now)).await.unwrap();
        store.create(new_job("c", now)).await.unwrap();
        store
            .update(a.id, UpdateScheduledJob::status(JobStatus::Completed))
            .await
            .unwrap();

        let counts = store.count_by_status().await.unwrap();
        assert_eq!(counts.scheduled, 1);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_updates_do_not_lose_changes() {
        let store = PooledJobStore::new(
            ResourcePool::new(PoolOptions {
                max_size: 4,
                connection_timeout: Duration::from_secs(5),
                query_latency: SimulatedLatency::between_ms(5, 5),
            }),
            TransactionOptions::default().with_max_retries(5),
        );
        let job = store.create(new_job("c", Timestamp::now())).await.unwrap();

        let status = store.update(job.id, UpdateScheduledJob::status(JobStatus::Running));
        let error = store.update(
            job.id,
            UpdateScheduledJob {
                last_error: Some(Some("boom".to_string())),
                ..Default::default()
            },
        );
        let (status, error) = tokio::join!(status, error);
        status.unwrap();
        error.unwrap();

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Running);
        assert_eq!(stored.last_error.as_deref(), Some("boom"));
    }
}
