use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::time::Instant;

use crate::jobs::error::JobError;
use crate::jobs::models::ScheduledJob;
use crate::jobs::registry::JobRegistry;
use crate::jobs::types::{JobExecutionContext, JobResult};

/// Dispatches a job to its handler under the context's timeout.
#[derive(Clone)]
pub struct JobExecutor {
    registry: Arc<JobRegistry>,
}

impl JobExecutor {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Run one attempt. Never fails: every error becomes a failed `JobResult`
    /// and the duration always covers the whole attempt.
    pub async fn execute(&self, job: &ScheduledJob, ctx: &JobExecutionContext) -> JobResult {
        let started = Instant::now();

        match self.try_execute(job, ctx).await {
            Ok(result) => JobResult {
                duration_ms: started.elapsed().as_millis() as u64,
                ..result
            },
            Err(e) => {
                let duration = started.elapsed();
                tracing::error!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    error = %e,
                    duration_ms = duration.as_millis() as u64,
                    "Job execution failed"
                );
                JobResult::failed(duration, e)
            }
        }
    }

    async fn try_execute(
        &self,
        job: &ScheduledJob,
        ctx: &JobExecutionContext,
    ) -> Result<JobResult, JobError> {
        let handler = self
            .registry
            .get(job.job_type)
            .ok_or_else(|| JobError::UnknownJobType(job.job_type.to_string()))?;

        if !handler.validate(&job.payload) {
            return Err(JobError::InvalidPayload(job.job_type));
        }

        tracing::debug!(
            job_id = %job.id,
            job_type = %job.job_type,
            customer_id = %job.customer_id,
            "Executing job"
        );

        let attempt = AssertUnwindSafe(handler.execute(job, ctx)).catch_unwind();
        match tokio::time::timeout(ctx.timeout, attempt).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_panic)) => Err(JobError::ExecutionFailed(format!(
                "handler for {} panicked",
                job.job_type
            ))),
            Err(_) => {
                // The handler future is already dropped; stop anything it spawned
                ctx.cancellation_token.cancel();
                Err(JobError::ExecutionTimeout {
                    timeout_ms: ctx.timeout.as_millis() as u64,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::handlers::test_support;
    use crate::jobs::types::{JobHandler, JobPayload, JobType};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    /// Cleanup stand-in with a configurable run time
    struct ProbeHandler {
        runtime: Duration,
        executed: Arc<AtomicU32>,
        landed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl JobHandler for ProbeHandler {
        fn job_type(&self) -> JobType {
            JobType::Cleanup
        }

        fn validate(&self, payload: &JobPayload) -> bool {
            payload.contains_key("resourceType")
        }

        async fn execute(&self, _job: &ScheduledJob, _ctx: &JobExecutionContext) -> JobResult {
            self.executed.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.runtime).await;
            self.landed.store(true, Ordering::SeqCst);
            JobResult::succeeded(self.runtime, json!({ "ok": true }))
        }
    }

    fn executor_with_probe(runtime: Duration) -> (JobExecutor, Arc<AtomicU32>, Arc<AtomicBool>) {
        let executed = Arc::new(AtomicU32::new(0));
        let landed = Arc::new(AtomicBool::new(false));
        let mut registry = JobRegistry::new();
        registry.register(ProbeHandler {
            runtime,
            executed: Arc::clone(&executed),
            landed: Arc::clone(&landed),
        });
        (JobExecutor::new(Arc::new(registry)), executed, landed)
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_payload_never_reaches_the_handler() {
        let (executor, executed, _) = executor_with_probe(Duration::from_millis(10));
        let job = test_support::job(JobType::Cleanup, json!({ "olderThan": 30 }));
        let ctx = JobExecutionContext::for_job(&job, Duration::from_secs(1));

        let result = executor.execute(&job, &ctx).await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Invalid payload for job type: cleanup")
        );
        assert_eq!(executed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_handler_is_unknown_job_type() {
        let executor = JobExecutor::new(Arc::new(JobRegistry::new()));
        let job = test_support::job(JobType::EmailSender, json!({}));
        let ctx = JobExecutionContext::for_job(&job, Duration::from_secs(1));

        let result = executor.execute(&job, &ctx).await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("No handler registered for job type: email-sender")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_the_handler() {
        let (executor, executed, landed) = executor_with_probe(Duration::from_secs(5));
        let job = test_support::job(JobType::Cleanup, json!({ "resourceType": "logs" }));
        let ctx = JobExecutionContext::for_job(&job, Duration::from_millis(100));

        let result = executor.execute(&job, &ctx).await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Job execution timeout after 100ms")
        );
        assert_eq!(result.duration_ms, 100);
        assert!(ctx.cancellation_token.is_cancelled());
        assert_eq!(executed.load(Ordering::SeqCst), 1);

        // The dropped handler never gets to finish
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!landed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn successful_run_reports_executor_duration() {
        let (executor, _, landed) = executor_with_probe(Duration::from_millis(250));
        let job = test_support::job(JobType::Cleanup, json!({ "resourceType": "logs" }));
        let ctx = JobExecutionContext::for_job(&job, Duration::from_secs(1));

        let result = executor.execute(&job, &ctx).await;
        assert!(result.success);
        assert_eq!(result.duration_ms, 250);
        assert_eq!(result.output, Some(json!({ "ok": true })));
        assert!(landed.load(Ordering::SeqCst));
        assert!(!ctx.cancellation_token.is_cancelled());
    }
}
