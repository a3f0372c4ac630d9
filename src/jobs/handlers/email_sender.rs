use async_trait::async_trait;
use jiff::Timestamp;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tokio::time::Instant;

use crate::jobs::handlers::{decode_payload, has_required_fields};
use crate::jobs::models::ScheduledJob;
use crate::jobs::types::{JobExecutionContext, JobHandler, JobPayload, JobResult, JobType};
use crate::utils::{SimulatedLatency, random_id};

const REQUIRED: &[&str] = &["recipient", "subject", "body"];

#[derive(Debug, Deserialize)]
struct EmailPayload {
    recipient: String,
    subject: String,
    body: String,
    #[serde(default)]
    attachments: Vec<JsonValue>,
}

/// Delivers one email through the outbound mail relay.
#[derive(Debug, Clone)]
pub struct EmailSenderHandler {
    connect: SimulatedLatency,
    send: SimulatedLatency,
}

impl EmailSenderHandler {
    pub fn new() -> Self {
        Self {
            connect: SimulatedLatency::between_ms(100, 300),
            send: SimulatedLatency::between_ms(200, 600),
        }
    }

    pub fn with_latency_scale(scale: f64) -> Self {
        let base = Self::new();
        Self {
            connect: base.connect.scaled(scale),
            send: base.send.scaled(scale),
        }
    }
}

impl Default for EmailSenderHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobHandler for EmailSenderHandler {
    fn job_type(&self) -> JobType {
        JobType::EmailSender
    }

    fn validate(&self, payload: &JobPayload) -> bool {
        has_required_fields(payload, REQUIRED)
    }

    async fn execute(&self, job: &ScheduledJob, _ctx: &JobExecutionContext) -> JobResult {
        let started = Instant::now();

        let payload: EmailPayload = match decode_payload(&job.payload) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(job_id = %job.id, customer_id = %job.customer_id, error = %e, "Email sending failed");
                return JobResult::failed(started.elapsed(), e);
            }
        };

        tracing::info!(
            job_id = %job.id,
            customer_id = %job.customer_id,
            recipient = %payload.recipient,
            subject = %payload.subject,
            body_length = payload.body.len(),
            attachment_count = payload.attachments.len(),
            "Sending email"
        );

        self.connect.wait().await;
        self.send.wait().await;

        tracing::info!(
            job_id = %job.id,
            customer_id = %job.customer_id,
            recipient = %payload.recipient,
            duration_ms = started.elapsed().as_millis() as u64,
            "Email sent successfully"
        );

        JobResult::succeeded(
            started.elapsed(),
            json!({
                "messageId": random_id("msg"),
                "recipient": payload.recipient,
                "sentAt": Timestamp::now().to_string(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::handlers::test_support;
    use std::time::Duration;

    #[test]
    fn empty_body_is_invalid() {
        let handler = EmailSenderHandler::new();
        let payload = test_support::payload(json!({
            "recipient": "ops@example.com", "subject": "Weekly digest", "body": ""
        }));
        assert!(!handler.validate(&payload));
    }

    #[tokio::test(start_paused = true)]
    async fn reports_message_id_and_recipient() {
        let handler = EmailSenderHandler::new();
        let job = test_support::job(
            JobType::EmailSender,
            json!({
                "recipient": "ops@example.com",
                "subject": "Weekly digest",
                "body": "hello",
                "attachments": ["report.pdf"]
            }),
        );
        let ctx = JobExecutionContext::for_job(&job, Duration::from_secs(30));

        let result = handler.execute(&job, &ctx).await;
        assert!(result.success);
        assert!((300..=900).contains(&result.duration_ms));

        let output = result.output.unwrap();
        assert_eq!(output["recipient"], "ops@example.com");
        assert!(output["messageId"].as_str().unwrap().starts_with("msg_"));
        assert!(output["sentAt"].as_str().unwrap().parse::<Timestamp>().is_ok());
    }
}
