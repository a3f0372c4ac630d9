//! Run command handler

use jiff::Timestamp;
use serde_json::{Value as JsonValue, json};

use crate::config::Settings;
use crate::jobs::{JobType, ScheduleOptions};
use crate::server::{Worker, shutdown_signal};
use crate::state::AppState;
use crate::workflow::{Workflow, WorkflowContext, WorkflowStatus, WorkflowStep};

const DEMO_CUSTOMER: &str = "cust_demo";

pub struct RunCommandHandler {
    config: Settings,
}

impl RunCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Start the worker and block until a shutdown signal
    pub async fn execute(self, demo: bool) -> anyhow::Result<()> {
        let worker = Worker::new(self.config);
        worker.start().await?;

        if demo {
            seed_demo(worker.state()).await?;
        }

        shutdown_signal().await;
        worker.shutdown().await
    }
}

fn demo_payload(job_type: JobType) -> JsonValue {
    match job_type {
        JobType::DataSync => json!({
            "source": "crm",
            "destination": "warehouse",
            "entityType": "contacts",
            "batchSize": 250
        }),
        JobType::EmailSender => json!({
            "recipient": "ops@example.com",
            "subject": "Weekly digest",
            "body": "Your weekly summary is ready."
        }),
        JobType::ReportGenerator => json!({
            "reportType": "usage",
            "startDate": "2024-01-01",
            "endDate": "2024-01-31",
            "format": "csv"
        }),
        JobType::Cleanup => json!({
            "resourceType": "sessions",
            "olderThan": 30,
            "dryRun": true
        }),
    }
}

fn demo_workflow() -> anyhow::Result<Workflow> {
    let steps: Vec<WorkflowStep> = serde_json::from_value(json!([
        { "id": "fetch", "name": "Fetch contacts", "type": "api-call", "stepNumber": 1,
          "config": { "url": "https://crm.example.com/contacts", "method": "GET" } },
        { "id": "filter", "name": "Filter active", "type": "transformation", "stepNumber": 2,
          "config": { "operation": "filter" } },
        { "id": "check", "name": "Any left", "type": "condition", "stepNumber": 3,
          "config": { "expression": "step_2_output.transformed" } },
        { "id": "notify", "name": "Notify ops", "type": "notification", "stepNumber": 4,
          "config": { "recipient": "ops@example.com" }, "timeoutMs": 5000 }
    ]))?;

    Ok(Workflow {
        id: "wf_demo".to_string(),
        customer_id: DEMO_CUSTOMER.to_string(),
        name: "Contact sync".to_string(),
        description: Some("Sample workflow run by --demo".to_string()),
        steps,
        status: WorkflowStatus::Active,
    })
}

async fn seed_demo(state: &AppState) -> anyhow::Result<()> {
    let now = Timestamp::now();
    for job_type in JobType::ALL {
        let payload = match demo_payload(job_type) {
            JsonValue::Object(map) => map,
            _ => continue,
        };
        state
            .scheduler
            .schedule_job(job_type, DEMO_CUSTOMER, now, payload, ScheduleOptions::default())
            .await?;
    }

    let execution = state
        .workflows
        .execute(&demo_workflow()?, WorkflowContext::new())
        .await;
    tracing::info!(
        execution_id = %execution.id,
        status = ?execution.status,
        steps = execution.step_results.len(),
        "Demo workflow finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobRegistry;

    #[test]
    fn demo_payloads_satisfy_their_handlers() {
        let registry = JobRegistry::with_default_handlers();
        for job_type in JobType::ALL {
            let handler = registry.get(job_type).unwrap();
            let payload = demo_payload(job_type).as_object().cloned().unwrap();
            assert!(handler.validate(&payload), "{job_type} demo payload rejected");
        }
    }

    #[test]
    fn demo_workflow_is_valid() {
        let workflow = demo_workflow().unwrap();
        assert!(crate::workflow::WorkflowValidator.validate_workflow(&workflow).valid);
    }

    #[tokio::test]
    async fn seeding_schedules_one_job_per_type() {
        let mut settings = Settings::default();
        settings.database.query_latency_ms = 0;
        settings.database.query_jitter_ms = 0;
        settings.jobs.latency_scale = 0.0;
        let state = AppState::new(settings);

        seed_demo(&state).await.unwrap();

        let scheduled = state.scheduler.get_scheduled_jobs(DEMO_CUSTOMER).await.unwrap();
        assert_eq!(scheduled.len(), 4);
    }
}
