//! External workflow validation collaborator.

use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::ValidationServiceConfig;
use crate::error::{AppError, AppResult};
use crate::utils::SimulatedLatency;
use crate::workflow::{Workflow, WorkflowValidator};

const SERVICE: &str = "validation-service";

/// Verdict returned by a validation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub validated_at: Timestamp,
    pub validation_duration_ms: u64,
}

#[async_trait]
pub trait WorkflowValidationService: Send + Sync {
    async fn validate_workflow(&self, workflow: &Workflow) -> AppResult<ValidationReport>;

    async fn health_check(&self) -> bool;
}

/// Stand-in for the remote validation service.
///
/// Each call waits out a simulated round-trip, bounded by the configured
/// timeout, then applies the local structural rules plus a few best-practice
/// warnings.
#[derive(Debug, Clone)]
pub struct SimulatedValidationClient {
    url: String,
    timeout: Duration,
    latency: SimulatedLatency,
    validator: WorkflowValidator,
}

impl SimulatedValidationClient {
    pub fn new(config: &ValidationServiceConfig) -> Self {
        Self {
            url: config.url.clone(),
            timeout: config.timeout(),
            latency: SimulatedLatency::with_jitter(config.latency_ms, config.jitter_ms),
            validator: WorkflowValidator,
        }
    }

    pub fn with_latency(mut self, latency: SimulatedLatency) -> Self {
        self.latency = latency;
        self
    }

    fn review(&self, workflow: &Workflow) -> (Vec<String>, Vec<String>) {
        let mut errors = self.validator.validate_workflow(workflow).errors;
        for step in &workflow.steps {
            let config = self.validator.validate_step_config(step);
            errors.extend(
                config
                    .errors
                    .into_iter()
                    .map(|e| format!("Step {}: {e}", step.step_number)),
            );
        }

        let mut warnings = Vec::new();
        if workflow.description.as_deref().is_none_or(str::is_empty) {
            warnings.push("Consider adding a workflow description".to_string());
        }
        for step in workflow.steps.iter().filter(|s| s.timeout_ms.is_none()) {
            warnings.push(format!(
                "Step {} has no timeout; consider adding error handling",
                step.step_number
            ));
        }
        (errors, warnings)
    }
}

#[async_trait]
impl WorkflowValidationService for SimulatedValidationClient {
    async fn validate_workflow(&self, workflow: &Workflow) -> AppResult<ValidationReport> {
        let started = Instant::now();
        tracing::info!(
            workflow_id = %workflow.id,
            customer_id = %workflow.customer_id,
            service_url = %self.url,
            "Calling external validation service"
        );

        if tokio::time::timeout(self.timeout, self.latency.wait())
            .await
            .is_err()
        {
            let duration_ms = started.elapsed().as_millis() as u64;
            tracing::error!(
                workflow_id = %workflow.id,
                duration_ms,
                "Validation service call timed out"
            );
            return Err(AppError::ExternalService {
                service: SERVICE.to_string(),
                message: format!("request timed out after {}ms", self.timeout.as_millis()),
            });
        }

        let (errors, warnings) = self.review(workflow);
        let report = ValidationReport {
            valid: errors.is_empty(),
            errors,
            warnings,
            validated_at: Timestamp::now(),
            validation_duration_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            workflow_id = %workflow.id,
            customer_id = %workflow.customer_id,
            valid = report.valid,
            duration_ms = report.validation_duration_ms,
            "Validation service call completed"
        );
        Ok(report)
    }

    async fn health_check(&self) -> bool {
        tracing::debug!(service_url = %self.url, "Checking validation service health");
        tokio::time::timeout(self.timeout, SimulatedLatency::between_ms(100, 300).wait())
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{StepType, WorkflowStatus, WorkflowStep};
    use serde_json::json;

    fn workflow(config: serde_json::Value) -> Workflow {
        Workflow {
            id: "wf_1".to_string(),
            customer_id: "cust_1".to_string(),
            name: "Import".to_string(),
            description: Some("Imports contacts".to_string()),
            steps: vec![WorkflowStep {
                id: "s1".to_string(),
                name: "Notify".to_string(),
                step_type: StepType::Notification,
                step_number: 1,
                config: config.as_object().cloned().unwrap_or_default(),
                timeout_ms: Some(1000),
            }],
            status: WorkflowStatus::Active,
        }
    }

    fn client(latency_ms: u64, timeout_secs: u64) -> SimulatedValidationClient {
        SimulatedValidationClient::new(&ValidationServiceConfig {
            latency_ms,
            jitter_ms: 0,
            timeout_secs,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn valid_workflow_passes_after_the_round_trip() {
        let report = client(2000, 30)
            .validate_workflow(&workflow(json!({ "recipient": "ops" })))
            .await
            .unwrap();
        assert!(report.valid);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
        assert_eq!(report.validation_duration_ms, 2000);
    }

    #[tokio::test(start_paused = true)]
    async fn step_config_problems_are_errors() {
        let report = client(0, 30)
            .validate_workflow(&workflow(json!({})))
            .await
            .unwrap();
        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec!["Step 1: Notification requires recipient in config"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_service_times_out() {
        let result = client(20_000, 5)
            .validate_workflow(&workflow(json!({ "recipient": "ops" })))
            .await;
        assert!(matches!(result, Err(AppError::ExternalService { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn health_check_succeeds() {
        assert!(client(0, 30).health_check().await);
    }
}
