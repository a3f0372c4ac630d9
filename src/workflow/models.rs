use std::time::Duration;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values threaded between steps; step outputs land under `step_<n>_output`
pub type WorkflowContext = serde_json::Map<String, JsonValue>;

/// Step configuration map
pub type StepConfig = serde_json::Map<String, JsonValue>;

// ============================================================================
// Definitions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepType {
    ApiCall,
    Transformation,
    Condition,
    Notification,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::ApiCall => "api-call",
            StepType::Transformation => "transformation",
            StepType::Condition => "condition",
            StepType::Notification => "notification",
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// 1-based position; unique within a workflow
    pub step_number: u32,
    #[serde(default)]
    pub config: StepConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl WorkflowStep {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn output_key(&self) -> String {
        format!("step_{}_output", self.step_number)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Draft,
    #[default]
    Active,
    Paused,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub customer_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub status: WorkflowStatus,
}

// ============================================================================
// Executions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecutionResult {
    pub step_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: String,
    pub workflow_id: String,
    pub customer_id: String,
    pub status: ExecutionStatus,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub current_step: Option<u32>,
    pub context: WorkflowContext,
    pub error: Option<String>,
    pub step_results: Vec<StepExecutionResult>,
}

impl WorkflowExecution {
    pub fn start(id: String, workflow: &Workflow, context: WorkflowContext) -> Self {
        Self {
            id,
            workflow_id: workflow.id.clone(),
            customer_id: workflow.customer_id.clone(),
            status: ExecutionStatus::Running,
            started_at: Timestamp::now(),
            completed_at: None,
            current_step: None,
            context,
            error: None,
            step_results: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != ExecutionStatus::Running
    }

    pub(crate) fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Timestamp::now());
    }

    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        self.status = ExecutionStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Timestamp::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_definitions_deserialize_from_camel_case() {
        let step: WorkflowStep = serde_json::from_value(json!({
            "id": "s1",
            "name": "Fetch",
            "type": "api-call",
            "stepNumber": 1,
            "config": { "url": "https://api.example.com", "method": "GET" },
            "timeoutMs": 500
        }))
        .unwrap();

        assert_eq!(step.step_type, StepType::ApiCall);
        assert_eq!(step.timeout(), Some(Duration::from_millis(500)));
        assert_eq!(step.output_key(), "step_1_output");
    }

    #[test]
    fn unknown_step_type_is_rejected() {
        let result = serde_json::from_value::<WorkflowStep>(json!({
            "id": "s1",
            "name": "Loop",
            "type": "loop",
            "stepNumber": 1
        }));
        assert!(result.is_err());
    }
}
