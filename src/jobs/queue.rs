use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use jiff::Timestamp;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler as TokioCronScheduler, JobSchedulerError};

use crate::config::JobsConfig;
use crate::db::{JobFilter, JobStore};
use crate::error::{AppError, AppResult};
use crate::jobs::executor::JobExecutor;
use crate::jobs::models::{JobStatusCounts, ScheduledJob, UpdateScheduledJob};
use crate::jobs::scheduler::JobScheduler;
use crate::jobs::types::{JobExecutionContext, JobStatus};

#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub poll_interval: Duration,
    /// Reported at startup; a tick always launches its whole batch
    pub concurrency: usize,
    pub job_timeout: Duration,
}

impl From<&JobsConfig> for QueueOptions {
    fn from(config: &JobsConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            concurrency: config.concurrency,
            job_timeout: config.job_timeout(),
        }
    }
}

/// What one poll did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Clone)]
struct QueueInner {
    store: Arc<dyn JobStore>,
    executor: JobExecutor,
    retry_sweep: Option<Arc<JobScheduler>>,
    options: QueueOptions,
}

/// Polls the store for due jobs and runs each batch concurrently.
pub struct JobQueue {
    inner: Arc<QueueInner>,
    scheduler: Mutex<Option<TokioCronScheduler>>,
}

fn scheduler_error(e: JobSchedulerError) -> AppError {
    AppError::Internal {
        source: anyhow::Error::from(e),
    }
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>, executor: JobExecutor, options: QueueOptions) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                store,
                executor,
                retry_sweep: None,
                options,
            }),
            scheduler: Mutex::new(None),
        }
    }

    /// End every tick by rescheduling retryable failures through `scheduler`
    pub fn with_retry_sweep(self, scheduler: Arc<JobScheduler>) -> Self {
        let inner = QueueInner {
            retry_sweep: Some(scheduler),
            ..(*self.inner).clone()
        };
        Self {
            inner: Arc::new(inner),
            scheduler: self.scheduler,
        }
    }

    pub fn options(&self) -> &QueueOptions {
        &self.inner.options
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }

    /// Run one pass right away, then poll on the configured interval
    pub async fn start(&self) -> AppResult<()> {
        let mut slot = self.scheduler.lock().await;
        if slot.is_some() {
            tracing::warn!("Job queue already running");
            return Ok(());
        }

        let options = &self.inner.options;
        tracing::info!(
            poll_interval_secs = options.poll_interval.as_secs(),
            concurrency = options.concurrency,
            job_timeout_ms = options.job_timeout.as_millis() as u64,
            retry_sweep = self.inner.retry_sweep.is_some(),
            "Starting job queue"
        );

        let scheduler = TokioCronScheduler::new().await.map_err(scheduler_error)?;

        let inner = Arc::clone(&self.inner);
        let poll = Job::new_repeated_async(options.poll_interval, move |_uuid, _lock| {
            let inner = Arc::clone(&inner);
            Box::pin(async move { inner.tick().await })
        })
        .map_err(scheduler_error)?;

        scheduler.add(poll).await.map_err(scheduler_error)?;
        scheduler.start().await.map_err(scheduler_error)?;

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.tick().await });

        *slot = Some(scheduler);
        Ok(())
    }

    /// Stop polling; batches already dispatched run to completion
    pub async fn stop(&self) -> AppResult<()> {
        let Some(mut scheduler) = self.scheduler.lock().await.take() else {
            return Ok(());
        };
        scheduler.shutdown().await.map_err(scheduler_error)?;
        tracing::info!("Job queue stopped");
        Ok(())
    }

    pub async fn process_ready_jobs(&self) -> AppResult<TickSummary> {
        self.inner.process_ready_jobs().await
    }

    pub async fn stats(&self) -> AppResult<JobStatusCounts> {
        self.inner.store.count_by_status().await
    }
}

impl QueueInner {
    async fn tick(&self) {
        if let Err(e) = self.process_ready_jobs().await {
            tracing::error!(error = %e, "Job queue poll failed");
        }
    }

    async fn process_ready_jobs(&self) -> AppResult<TickSummary> {
        let ready = self
            .store
            .find_many(&JobFilter::due(Timestamp::now()))
            .await?;

        let mut summary = TickSummary::default();
        if !ready.is_empty() {
            tracing::info!(count = ready.len(), "Processing ready jobs");

            let outcomes = join_all(ready.into_iter().map(|job| self.run_job(job))).await;
            summary.dispatched = outcomes.len();
            summary.succeeded = outcomes.iter().filter(|ok| **ok).count();
            summary.failed = summary.dispatched - summary.succeeded;
        }

        if let Some(scheduler) = &self.retry_sweep {
            if let Err(e) = scheduler.reschedule_failed_jobs().await {
                tracing::error!(error = %e, "Retry sweep failed");
            }
        }

        Ok(summary)
    }

    /// Run one job and record the outcome. Returns whether it succeeded.
    async fn run_job(&self, job: ScheduledJob) -> bool {
        let started = UpdateScheduledJob {
            status: Some(JobStatus::Running),
            last_run_at: Some(Timestamp::now()),
            ..Default::default()
        };
        let job = match self.store.update(job.id, started).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to mark job running");
                return false;
            }
        };

        let ctx = JobExecutionContext::for_job(&job, self.options.job_timeout);
        let result = self.executor.execute(&job, &ctx).await;

        let outcome = if result.success {
            tracing::info!(
                job_id = %job.id,
                job_type = %job.job_type,
                customer_id = %job.customer_id,
                duration_ms = result.duration_ms,
                "Job completed"
            );
            UpdateScheduledJob::status(JobStatus::Completed)
        } else {
            tracing::warn!(
                job_id = %job.id,
                job_type = %job.job_type,
                customer_id = %job.customer_id,
                duration_ms = result.duration_ms,
                error = result.error.as_deref().unwrap_or_default(),
                "Job failed"
            );
            UpdateScheduledJob {
                status: Some(JobStatus::Failed),
                last_error: Some(result.error.clone()),
                ..Default::default()
            }
        };

        if let Err(e) = self.store.update(job.id, outcome).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to record job outcome");
            return false;
        }
        result.success
    }
}
