use std::sync::Arc;
use std::time::Duration;

use jiff::{RoundMode, Timestamp, TimestampRound, Unit};
use uuid::Uuid;

use crate::db::{JobFilter, JobStore};
use crate::error::{AppError, AppResult};
use crate::jobs::models::{NewScheduledJob, ScheduledJob, UpdateScheduledJob};
use crate::jobs::types::{JobPayload, JobStatus, JobType};

const BACKOFF_BASE: Duration = Duration::from_secs(60);

/// Per-call scheduling options
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleOptions {
    /// Retry budget; the scheduler default applies when unset
    pub max_retries: Option<u32>,
}

/// Round `at` up to the next whole hour.
///
/// Sub-second precision is dropped first, so a time exactly on the hour
/// stays where it is.
pub fn quantize_to_hour(at: Timestamp) -> AppResult<Timestamp> {
    let round = |ts: Timestamp, unit: Unit, mode: RoundMode| {
        ts.round(TimestampRound::new().smallest(unit).mode(mode))
            .map_err(|e| AppError::validation("run_at", e.to_string()))
    };

    let seconds = round(at, Unit::Second, RoundMode::Floor)?;
    round(seconds, Unit::Hour, RoundMode::Ceil)
}

/// Retry delay after `retry_count` failed attempts: `2^retry_count` minutes.
pub fn backoff_delay(retry_count: u32) -> Duration {
    let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
    BACKOFF_BASE.saturating_mul(factor)
}

/// Creates, retries and cancels scheduled jobs
pub struct JobScheduler {
    store: Arc<dyn JobStore>,
    default_max_retries: u32,
}

impl JobScheduler {
    pub fn new(store: Arc<dyn JobStore>, default_max_retries: u32) -> Self {
        Self {
            store,
            default_max_retries,
        }
    }

    /// Persist a new job at the first whole hour at or after `run_at`
    pub async fn schedule_job(
        &self,
        job_type: JobType,
        customer_id: impl Into<String>,
        run_at: Timestamp,
        payload: JobPayload,
        options: ScheduleOptions,
    ) -> AppResult<ScheduledJob> {
        let next_run_at = quantize_to_hour(run_at)?;
        let new_job = NewScheduledJob {
            job_type,
            customer_id: customer_id.into(),
            next_run_at,
            max_retries: options.max_retries.unwrap_or(self.default_max_retries),
            payload,
        };

        let job = self.store.create(new_job.into_job(Timestamp::now())).await?;

        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            customer_id = %job.customer_id,
            next_run_at = %job.next_run_at,
            "Job scheduled"
        );
        Ok(job)
    }

    pub async fn reschedule_job(&self, job: &ScheduledJob) -> AppResult<ScheduledJob> {
        self.reschedule_job_at(job, Timestamp::now()).await
    }

    /// Retry a failed job with exponential backoff measured from `now`.
    ///
    /// A job whose retry budget is spent is marked failed and left there.
    pub async fn reschedule_job_at(
        &self,
        job: &ScheduledJob,
        now: Timestamp,
    ) -> AppResult<ScheduledJob> {
        if job.retry_count >= job.max_retries {
            tracing::warn!(
                job_id = %job.id,
                retry_count = job.retry_count,
                max_retries = job.max_retries,
                "Job exceeded max retries"
            );
            return self
                .store
                .update(job.id, UpdateScheduledJob::status(JobStatus::Failed))
                .await;
        }

        let delay = backoff_delay(job.retry_count);
        let retry_at = now
            .checked_add(delay)
            .map_err(|e| AppError::validation("next_run_at", e.to_string()))?;
        let changes = UpdateScheduledJob {
            status: Some(JobStatus::Scheduled),
            next_run_at: Some(quantize_to_hour(retry_at)?),
            retry_count: Some(job.retry_count + 1),
            ..Default::default()
        };

        let updated = self.store.update(job.id, changes).await?;
        tracing::info!(
            job_id = %updated.id,
            retry_count = updated.retry_count,
            delay_ms = delay.as_millis() as u64,
            next_run_at = %updated.next_run_at,
            "Job rescheduled"
        );
        Ok(updated)
    }

    /// Delete a job regardless of its status
    pub async fn cancel_job(&self, id: Uuid) -> AppResult<bool> {
        let existed = self.store.delete(id).await?;
        tracing::info!(job_id = %id, existed, "Job cancelled");
        Ok(existed)
    }

    pub async fn get_scheduled_jobs(&self, customer_id: &str) -> AppResult<Vec<ScheduledJob>> {
        self.store
            .find_many(&JobFilter::with_status(JobStatus::Scheduled).customer(customer_id))
            .await
    }

    /// Reschedule every failed job that still has retry budget.
    ///
    /// Returns how many jobs were put back on the schedule. A job that
    /// cannot be rescheduled is logged and skipped.
    pub async fn reschedule_failed_jobs(&self) -> AppResult<usize> {
        let failed = self
            .store
            .find_many(&JobFilter::retryable_failures())
            .await?;

        let mut rescheduled = 0;
        for job in &failed {
            match self.reschedule_job(job).await {
                Ok(_) => rescheduled += 1,
                Err(e) => {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to reschedule job");
                }
            }
        }

        if rescheduled > 0 {
            tracing::info!(count = rescheduled, "Rescheduled failed jobs");
        }
        Ok(rescheduled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{PoolOptions, PooledJobStore, ResourcePool, TransactionOptions};
    use crate::utils::SimulatedLatency;
    use proptest::prelude::*;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn scheduler() -> (JobScheduler, Arc<PooledJobStore>) {
        let pool = ResourcePool::new(PoolOptions {
            max_size: 2,
            connection_timeout: Duration::from_secs(1),
            query_latency: SimulatedLatency::ZERO,
        });
        let store = Arc::new(PooledJobStore::new(pool, TransactionOptions::default()));
        (JobScheduler::new(store.clone(), 3), store)
    }

    #[test]
    fn quantizes_to_the_next_hour() {
        assert_eq!(
            quantize_to_hour(ts("2024-03-10T10:15:30Z")).unwrap(),
            ts("2024-03-10T11:00:00Z")
        );
        assert_eq!(
            quantize_to_hour(ts("2024-03-10T23:00:01Z")).unwrap(),
            ts("2024-03-11T00:00:00Z")
        );
    }

    #[test]
    fn on_the_hour_is_unchanged() {
        let at = ts("2024-03-10T10:00:00Z");
        assert_eq!(quantize_to_hour(at).unwrap(), at);
        assert_eq!(quantize_to_hour(ts("2024-03-10T10:00:00.750Z")).unwrap(), at);
    }

    #[test]
    fn backoff_doubles_each_minute() {
        for (retry_count, minutes) in [(0, 1), (1, 2), (2, 4), (3, 8), (4, 16)] {
            assert_eq!(
                backoff_delay(retry_count),
                Duration::from_secs(60 * minutes)
            );
        }
        assert_eq!(backoff_delay(64), BACKOFF_BASE.saturating_mul(u32::MAX));
    }

    proptest! {
        #[test]
        fn quantized_time_is_an_hour_boundary_within_one_hour(secs in 0i64..4_000_000_000, nanos in 0i32..1_000_000_000) {
            let at = Timestamp::new(secs, nanos).unwrap();
            let quantized = quantize_to_hour(at).unwrap();
            prop_assert_eq!(quantized.as_second() % 3600, 0);
            prop_assert_eq!(quantized.subsec_nanosecond(), 0);
            prop_assert!(quantized.as_second() >= secs);
            prop_assert!(quantized.as_second() - secs < 3600);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_job_persists_a_quantized_job() {
        let (scheduler, store) = scheduler();
        let job = scheduler
            .schedule_job(
                JobType::Cleanup,
                "cust_1",
                ts("2030-01-01T08:45:00Z"),
                JobPayload::new(),
                ScheduleOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(job.next_run_at, ts("2030-01-01T09:00:00Z"));
        assert_eq!(job.status, JobStatus::Scheduled);
        assert_eq!(job.retry_count, 0);
        assert_eq!(job.max_retries, 3);
        assert_eq!(store.get(job.id).await.unwrap(), Some(job));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_retry_budget_wins_over_default() {
        let (scheduler, _) = scheduler();
        let job = scheduler
            .schedule_job(
                JobType::DataSync,
                "cust_1",
                Timestamp::now(),
                JobPayload::new(),
                ScheduleOptions {
                    max_retries: Some(0),
                },
            )
            .await
            .unwrap();
        assert_eq!(job.max_retries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_applies_backoff_and_quantizes() {
        let (scheduler, _) = scheduler();
        let job = scheduler
            .schedule_job(
                JobType::EmailSender,
                "cust_1",
                Timestamp::now(),
                JobPayload::new(),
                ScheduleOptions::default(),
            )
            .await
            .unwrap();

        let now = ts("2030-01-01T10:59:30Z");
        let retried = scheduler.reschedule_job_at(&job, now).await.unwrap();
        assert_eq!(retried.retry_count, 1);
        assert_eq!(retried.status, JobStatus::Scheduled);
        assert_eq!(retried.next_run_at, ts("2030-01-01T12:00:00Z"));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_never_exceed_the_budget() {
        let (scheduler, _) = scheduler();
        let mut job = scheduler
            .schedule_job(
                JobType::ReportGenerator,
                "cust_1",
                Timestamp::now(),
                JobPayload::new(),
                ScheduleOptions {
                    max_retries: Some(2),
                },
            )
            .await
            .unwrap();

        for expected in 1..=2 {
            job = scheduler.reschedule_job(&job).await.unwrap();
            assert_eq!(job.retry_count, expected);
            assert_eq!(job.status, JobStatus::Scheduled);
        }

        // The third failure is one past the budget
        job = scheduler.reschedule_job(&job).await.unwrap();
        assert_eq!(job.retry_count, 2);
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_job_deletes_unconditionally() {
        let (scheduler, store) = scheduler();
        let job = scheduler
            .schedule_job(
                JobType::Cleanup,
                "cust_1",
                Timestamp::now(),
                JobPayload::new(),
                ScheduleOptions::default(),
            )
            .await
            .unwrap();
        store
            .update(job.id, UpdateScheduledJob::status(JobStatus::Running))
            .await
            .unwrap();

        assert!(scheduler.cancel_job(job.id).await.unwrap());
        assert!(store.get(job.id).await.unwrap().is_none());
        assert!(!scheduler.cancel_job(job.id).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_jobs_are_listed_per_customer() {
        let (scheduler, store) = scheduler();
        let now = Timestamp::now();
        let mine = scheduler
            .schedule_job(JobType::Cleanup, "cust_1", now, JobPayload::new(), ScheduleOptions::default())
            .await
            .unwrap();
        let done = scheduler
            .schedule_job(JobType::Cleanup, "cust_1", now, JobPayload::new(), ScheduleOptions::default())
            .await
            .unwrap();
        scheduler
            .schedule_job(JobType::Cleanup, "cust_2", now, JobPayload::new(), ScheduleOptions::default())
            .await
            .unwrap();
        store
            .update(done.id, UpdateScheduledJob::status(JobStatus::Completed))
            .await
            .unwrap();

        let listed = scheduler.get_scheduled_jobs("cust_1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_reschedules_only_retryable_failures() {
        let (scheduler, store) = scheduler();
        let now = Timestamp::now();
        let retryable = scheduler
            .schedule_job(JobType::Cleanup, "c", now, JobPayload::new(), ScheduleOptions::default())
            .await
            .unwrap();
        let spent = scheduler
            .schedule_job(
                JobType::Cleanup,
                "c",
                now,
                JobPayload::new(),
                ScheduleOptions {
                    max_retries: Some(0),
                },
            )
            .await
            .unwrap();
        for id in [retryable.id, spent.id] {
            store
                .update(id, UpdateScheduledJob::status(JobStatus::Failed))
                .await
                .unwrap();
        }

        assert_eq!(scheduler.reschedule_failed_jobs().await.unwrap(), 1);

        let retried = store.get(retryable.id).await.unwrap().unwrap();
        assert_eq!(retried.status, JobStatus::Scheduled);
        assert_eq!(retried.retry_count, 1);
        let untouched = store.get(spent.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, JobStatus::Failed);
    }
}
