use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use crate::jobs::handlers::{decode_payload, has_required_fields};
use crate::jobs::models::ScheduledJob;
use crate::jobs::types::{JobExecutionContext, JobHandler, JobPayload, JobResult, JobType};
use crate::utils::SimulatedLatency;

const REQUIRED: &[&str] = &["source", "destination", "entityType"];

fn default_batch_size() -> u64 {
    100
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataSyncPayload {
    source: String,
    destination: String,
    entity_type: String,
    #[serde(default = "default_batch_size")]
    batch_size: u64,
}

/// Copies records of one entity type from a source to a destination.
#[derive(Debug, Clone)]
pub struct DataSyncHandler {
    fetch: SimulatedLatency,
    transform: SimulatedLatency,
    write: SimulatedLatency,
}

impl DataSyncHandler {
    pub fn new() -> Self {
        Self {
            fetch: SimulatedLatency::between_ms(200, 500),
            transform: SimulatedLatency::between_ms(100, 300),
            write: SimulatedLatency::between_ms(150, 400),
        }
    }

    pub fn with_latency_scale(scale: f64) -> Self {
        let base = Self::new();
        Self {
            fetch: base.fetch.scaled(scale),
            transform: base.transform.scaled(scale),
            write: base.write.scaled(scale),
        }
    }
}

impl Default for DataSyncHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobHandler for DataSyncHandler {
    fn job_type(&self) -> JobType {
        JobType::DataSync
    }

    fn validate(&self, payload: &JobPayload) -> bool {
        has_required_fields(payload, REQUIRED)
    }

    async fn execute(&self, job: &ScheduledJob, _ctx: &JobExecutionContext) -> JobResult {
        let started = Instant::now();

        let payload: DataSyncPayload = match decode_payload(&job.payload) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    customer_id = %job.customer_id,
                    error = %e,
                    "Data sync failed"
                );
                return JobResult::failed(started.elapsed(), e);
            }
        };

        tracing::info!(
            job_id = %job.id,
            customer_id = %job.customer_id,
            source = %payload.source,
            destination = %payload.destination,
            entity_type = %payload.entity_type,
            "Starting data sync"
        );

        self.fetch.wait().await;
        self.transform.wait().await;
        self.write.wait().await;

        let records_synced = rand::rng().random_range(100..1100u64);

        tracing::info!(
            job_id = %job.id,
            customer_id = %job.customer_id,
            entity_type = %payload.entity_type,
            records_synced,
            duration_ms = started.elapsed().as_millis() as u64,
            "Data sync completed"
        );

        JobResult::succeeded(
            started.elapsed(),
            json!({
                "recordsSynced": records_synced,
                "source": payload.source,
                "destination": payload.destination,
                "batchSize": payload.batch_size,
            }),
        )
    }
}
