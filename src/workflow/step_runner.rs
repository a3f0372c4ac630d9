use jiff::Timestamp;
use serde_json::{Value as JsonValue, json};
use tokio::time::Instant;

use crate::utils::{SimulatedLatency, random_id};
use crate::workflow::error::WorkflowError;
use crate::workflow::models::{StepExecutionResult, StepType, WorkflowContext, WorkflowStep};
use crate::workflow::validator::WorkflowValidator;

const API_CALL: SimulatedLatency = SimulatedLatency::between_ms(100, 300);
const TRANSFORMATION: SimulatedLatency = SimulatedLatency::between_ms(50, 150);
const CONDITION: SimulatedLatency = SimulatedLatency::between_ms(20, 70);
const NOTIFICATION: SimulatedLatency = SimulatedLatency::between_ms(80, 230);

fn config_value(step: &WorkflowStep, key: &str) -> JsonValue {
    step.config.get(key).cloned().unwrap_or(JsonValue::Null)
}

/// Executes a single step by type
#[derive(Debug, Clone)]
pub struct StepRunner {
    latency_scale: f64,
    validator: WorkflowValidator,
}

impl Default for StepRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl StepRunner {
    pub fn new() -> Self {
        Self::with_latency_scale(1.0)
    }

    pub fn with_latency_scale(latency_scale: f64) -> Self {
        Self {
            latency_scale,
            validator: WorkflowValidator,
        }
    }

    /// Run `step` against the current context. Failures are reported in the
    /// result, never returned.
    pub async fn execute_step(
        &self,
        step: &WorkflowStep,
        context: &WorkflowContext,
    ) -> StepExecutionResult {
        let started = Instant::now();
        tracing::debug!(
            step_id = %step.id,
            step_name = %step.name,
            step_type = %step.step_type,
            "Step execution started"
        );

        let outcome = match step.timeout() {
            Some(timeout) => tokio::time::timeout(timeout, self.run(step, context))
                .await
                .unwrap_or(Err(WorkflowError::StepTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })),
            None => self.run(step, context).await,
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                tracing::debug!(step_id = %step.id, duration_ms, "Step execution completed");
                StepExecutionResult {
                    step_id: step.id.clone(),
                    success: true,
                    output: Some(output),
                    duration_ms,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(
                    step_id = %step.id,
                    step_name = %step.name,
                    error = %e,
                    duration_ms,
                    "Step execution failed"
                );
                StepExecutionResult {
                    step_id: step.id.clone(),
                    success: false,
                    output: None,
                    duration_ms,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn run(
        &self,
        step: &WorkflowStep,
        context: &WorkflowContext,
    ) -> Result<JsonValue, WorkflowError> {
        let config = self.validator.validate_step_config(step);
        if !config.valid {
            return Err(WorkflowError::InvalidStepConfig(config.errors));
        }

        let output = match step.step_type {
            StepType::ApiCall => {
                API_CALL.scaled(self.latency_scale).wait().await;
                json!({
                    "statusCode": 200,
                    "data": {
                        "result": "success",
                        "requestedAt": Timestamp::now().to_string(),
                    },
                    "url": config_value(step, "url"),
                    "method": config_value(step, "method"),
                })
            }
            StepType::Transformation => {
                TRANSFORMATION.scaled(self.latency_scale).wait().await;
                let input_keys: Vec<&String> = context.keys().collect();
                json!({
                    "transformed": true,
                    "operation": config_value(step, "operation"),
                    "inputKeys": input_keys,
                })
            }
            StepType::Condition => {
                CONDITION.scaled(self.latency_scale).wait().await;
                json!({
                    "conditionMet": true,
                    "expression": config_value(step, "expression"),
                    "evaluatedAt": Timestamp::now().to_string(),
                })
            }
            StepType::Notification => {
                NOTIFICATION.scaled(self.latency_scale).wait().await;
                json!({
                    "sent": true,
                    "notificationId": random_id("notif"),
                    "recipient": config_value(step, "recipient"),
                })
            }
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn step(step_type: StepType, config: JsonValue) -> WorkflowStep {
        WorkflowStep {
            id: "s1".to_string(),
            name: "Step".to_string(),
            step_type,
            step_number: 1,
            config: config.as_object().cloned().unwrap_or_default(),
            timeout_ms: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn api_call_echoes_request() {
        let runner = StepRunner::with_latency_scale(0.0);
        let result = runner
            .execute_step(
                &step(StepType::ApiCall, json!({ "url": "https://x", "method": "POST" })),
                &WorkflowContext::new(),
            )
            .await;

        assert!(result.success);
        let output = result.output.unwrap();
        assert_eq!(output["statusCode"], 200);
        assert_eq!(output["data"]["result"], "success");
        assert_eq!(output["method"], "POST");
    }

    #[tokio::test(start_paused = true)]
    async fn transformation_lists_context_keys() {
        let mut context = WorkflowContext::new();
        context.insert("input".to_string(), json!(1));
        context.insert("step_1_output".to_string(), json!({}));

        let result = StepRunner::with_latency_scale(0.0)
            .execute_step(
                &step(StepType::Transformation, json!({ "operation": "flatten" })),
                &context,
            )
            .await;
        let output = result.output.unwrap();
        assert_eq!(output["inputKeys"], json!(["input", "step_1_output"]));
        assert_eq!(output["operation"], "flatten");
    }

    #[tokio::test(start_paused = true)]
    async fn notification_gets_an_id() {
        let result = StepRunner::with_latency_scale(0.0)
            .execute_step(
                &step(StepType::Notification, json!({ "recipient": "ops@example.com" })),
                &WorkflowContext::new(),
            )
            .await;
        let output = result.output.unwrap();
        assert_eq!(output["sent"], true);
        assert!(output["notificationId"].as_str().unwrap().starts_with("notif_"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_config_fails_the_step() {
        let result = StepRunner::with_latency_scale(0.0)
            .execute_step(&step(StepType::Condition, json!({})), &WorkflowContext::new())
            .await;
        assert!(!result.success);
        assert!(result.output.is_none());
        assert_eq!(
            result.error.as_deref(),
            Some("Condition requires expression in config")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn step_timeout_bounds_execution() {
        let mut slow = step(StepType::ApiCall, json!({ "url": "https://x", "method": "GET" }));
        slow.timeout_ms = Some(50);

        let result = StepRunner::new()
            .execute_step(&slow, &WorkflowContext::new())
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Step timed out after 50ms"));
        assert_eq!(result.duration_ms, 50);
        assert!(Duration::from_millis(result.duration_ms) < API_CALL.min());
    }
}
