use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tokio::time::Instant;

use crate::jobs::handlers::{decode_payload, has_required_fields};
use crate::jobs::models::ScheduledJob;
use crate::jobs::types::{JobExecutionContext, JobHandler, JobPayload, JobResult, JobType};
use crate::utils::SimulatedLatency;

const REQUIRED: &[&str] = &["resourceType", "olderThan"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CleanupPayload {
    resource_type: String,
    /// Age cutoff, either a date string or a number of days
    older_than: JsonValue,
    #[serde(default)]
    dry_run: bool,
}

/// Deletes stale resources of one type; a dry run only counts them.
#[derive(Debug, Clone)]
pub struct CleanupHandler {
    scan: SimulatedLatency,
    delete: SimulatedLatency,
}

impl CleanupHandler {
    pub fn new() -> Self {
        Self {
            scan: SimulatedLatency::between_ms(150, 400),
            delete: SimulatedLatency::between_ms(100, 300),
        }
    }

    pub fn with_latency_scale(scale: f64) -> Self {
        let base = Self::new();
        Self {
            scan: base.scan.scaled(scale),
            delete: base.delete.scaled(scale),
        }
    }
}

impl Default for CleanupHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobHandler for CleanupHandler {
    fn job_type(&self) -> JobType {
        JobType::Cleanup
    }

    fn validate(&self, payload: &JobPayload) -> bool {
        has_required_fields(payload, REQUIRED)
    }

    async fn execute(&self, job: &ScheduledJob, _ctx: &JobExecutionContext) -> JobResult {
        let started = Instant::now();

        let payload: CleanupPayload = match decode_payload(&job.payload) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(job_id = %job.id, customer_id = %job.customer_id, error = %e, "Cleanup failed");
                return JobResult::failed(started.elapsed(), e);
            }
        };

        tracing::info!(
            job_id = %job.id,
            customer_id = %job.customer_id,
            resource_type = %payload.resource_type,
            older_than = %payload.older_than,
            dry_run = payload.dry_run,
            "Starting cleanup"
        );

        self.scan.wait().await;
        let records_identified = rand::rng().random_range(10..510u64);

        let records_deleted = if payload.dry_run {
            0
        } else {
            self.delete.wait().await;
            records_identified
        };

        tracing::info!(
            job_id = %job.id,
            customer_id = %job.customer_id,
            resource_type = %payload.resource_type,
            records_deleted,
            duration_ms = started.elapsed().as_millis() as u64,
            "Cleanup completed"
        );

        JobResult::succeeded(
            started.elapsed(),
            json!({
                "resourceType": payload.resource_type,
                "recordsIdentified": records_identified,
                "recordsDeleted": records_deleted,
                "dryRun": payload.dry_run,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::handlers::test_support;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn dry_run_deletes_nothing_and_skips_delete_stage() {
        let handler = CleanupHandler::new();
        let job = test_support::job(
            JobType::Cleanup,
            json!({ "resourceType": "sessions", "olderThan": 30, "dryRun": true }),
        );
        let ctx = JobExecutionContext::for_job(&job, Duration::from_secs(30));

        let result = handler.execute(&job, &ctx).await;
        assert!(result.success);
        assert!(result.duration_ms <= 400);

        let output = result.output.unwrap();
        assert_eq!(output["recordsDeleted"], 0);
        assert_eq!(output["dryRun"], true);
        assert!(output["recordsIdentified"].as_u64().unwrap() >= 10);
    }

    #[tokio::test(start_paused = true)]
    async fn real_run_deletes_everything_identified() {
        let handler = CleanupHandler::new();
        let job = test_support::job(
            JobType::Cleanup,
            json!({ "resourceType": "sessions", "olderThan": "2024-01-01" }),
        );
        let ctx = JobExecutionContext::for_job(&job, Duration::from_secs(30));

        let result = handler.execute(&job, &ctx).await;
        assert!(result.success);
        assert!(result.duration_ms >= 250);

        let output = result.output.unwrap();
        assert_eq!(output["recordsDeleted"], output["recordsIdentified"]);
        assert_eq!(output["dryRun"], false);
    }
}
