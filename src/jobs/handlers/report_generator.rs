use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use crate::jobs::handlers::{decode_payload, has_required_fields};
use crate::jobs::models::ScheduledJob;
use crate::jobs::types::{JobExecutionContext, JobHandler, JobPayload, JobResult, JobType};
use crate::utils::{SimulatedLatency, random_id};

const REQUIRED: &[&str] = &["reportType", "startDate", "endDate"];

fn default_format() -> String {
    "pdf".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportPayload {
    report_type: String,
    start_date: String,
    end_date: String,
    #[serde(default = "default_format")]
    format: String,
}

/// Builds a report file for a customer over a date range.
#[derive(Debug, Clone)]
pub struct ReportGeneratorHandler {
    query: SimulatedLatency,
    aggregate: SimulatedLatency,
    render: SimulatedLatency,
}

impl ReportGeneratorHandler {
    pub fn new() -> Self {
        Self {
            query: SimulatedLatency::between_ms(300, 800),
            aggregate: SimulatedLatency::between_ms(200, 600),
            render: SimulatedLatency::between_ms(400, 1000),
        }
    }

    pub fn with_latency_scale(scale: f64) -> Self {
        let base = Self::new();
        Self {
            query: base.query.scaled(scale),
            aggregate: base.aggregate.scaled(scale),
            render: base.render.scaled(scale),
        }
    }
}

impl Default for ReportGeneratorHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobHandler for ReportGeneratorHandler {
    fn job_type(&self) -> JobType {
        JobType::ReportGenerator
    }

    fn validate(&self, payload: &JobPayload) -> bool {
        has_required_fields(payload, REQUIRED)
    }

    async fn execute(&self, job: &ScheduledJob, _ctx: &JobExecutionContext) -> JobResult {
        let started = Instant::now();

        let payload: ReportPayload = match decode_payload(&job.payload) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(job_id = %job.id, customer_id = %job.customer_id, error = %e, "Report generation failed");
                return JobResult::failed(started.elapsed(), e);
            }
        };

        tracing::info!(
            job_id = %job.id,
            customer_id = %job.customer_id,
            report_type = %payload.report_type,
            start_date = %payload.start_date,
            end_date = %payload.end_date,
            format = %payload.format,
            "Generating report"
        );

        self.query.wait().await;
        self.aggregate.wait().await;
        self.render.wait().await;

        // 1-10MB
        let file_size = rand::rng().random_range(1_000_000..11_000_000u64);

        tracing::info!(
            job_id = %job.id,
            customer_id = %job.customer_id,
            report_type = %payload.report_type,
            duration_ms = started.elapsed().as_millis() as u64,
            "Report generated successfully"
        );

        JobResult::succeeded(
            started.elapsed(),
            json!({
                "reportId": random_id("report"),
                "reportType": payload.report_type,
                "format": payload.format,
                "downloadUrl": format!("/reports/{}/download", job.customer_id),
                "fileSize": file_size,
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
    async fn defaults_to_pdf_and_links_customer_download() {
        let handler = ReportGeneratorHandler::new();
        let job = test_support::job(
            JobType::ReportGenerator,
            json!({ "reportType": "usage", "startDate": "2024-01-01", "endDate": "2024-01-31" }),
        );
        assert!(handler.validate(&job.payload));
        let ctx = JobExecutionContext::for_job(&job, Duration::from_secs(30));

        let result = handler.execute(&job, &ctx).await;
        assert!(result.success);
        assert!(result.duration_ms >= 900);

        let output = result.output.unwrap();
        assert_eq!(output["format"], "pdf");
        assert_eq!(output["downloadUrl"], "/reports/cust_42/download");
        let size = output["fileSize"].as_u64().unwrap();
        assert!((1_000_000..11_000_000).contains(&size));
    }

    #[test]
    fn missing_end_date_is_invalid() {
        let handler = ReportGeneratorHandler::new();
        let payload = test_support::payload(json!({ "reportType": "usage", "startDate": "2024-01-01" }));
        assert!(!handler.validate(&payload));
    }
}
