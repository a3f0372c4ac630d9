use std::collections::BTreeSet;

use crate::jobs::handlers::is_truthy;
use crate::workflow::models::{StepType, Workflow, WorkflowStep};

/// Result of a structural check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Local structural checks run before any step executes
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowValidator;

impl WorkflowValidator {
    pub fn validate_workflow(&self, workflow: &Workflow) -> ValidationOutcome {
        let mut errors = Vec::new();

        if workflow.id.is_empty() {
            errors.push("Workflow ID is required".to_string());
        }
        if workflow.name.is_empty() {
            errors.push("Workflow name is required".to_string());
        }
        if workflow.customer_id.is_empty() {
            errors.push("Customer ID is required".to_string());
        }

        if workflow.steps.is_empty() {
            errors.push("Workflow must have at least one step".to_string());
        }
        for (index, step) in workflow.steps.iter().enumerate() {
            for error in self.validate_step(step) {
                errors.push(format!("Step {}: {error}", index + 1));
            }
        }

        let mut seen = BTreeSet::new();
        let duplicates: BTreeSet<u32> = workflow
            .steps
            .iter()
            .map(|step| step.step_number)
            .filter(|number| !seen.insert(*number))
            .collect();
        if !duplicates.is_empty() {
            let list: Vec<String> = duplicates.iter().map(u32::to_string).collect();
            errors.push(format!("Duplicate step numbers found: {}", list.join(", ")));
        }

        let outcome = ValidationOutcome::from_errors(errors);
        if !outcome.valid {
            tracing::warn!(
                workflow_id = %workflow.id,
                errors = ?outcome.errors,
                "Workflow validation failed"
            );
        }
        outcome
    }

    fn validate_step(&self, step: &WorkflowStep) -> Vec<String> {
        let mut errors = Vec::new();
        if step.id.is_empty() {
            errors.push("Step ID is required".to_string());
        }
        if step.name.is_empty() {
            errors.push("Step name is required".to_string());
        }
        if step.step_number < 1 {
            errors.push("Step number must be positive".to_string());
        }
        errors
    }

    /// Type-specific config requirements
    pub fn validate_step_config(&self, step: &WorkflowStep) -> ValidationOutcome {
        let required: &[(&str, &str)] = match step.step_type {
            StepType::ApiCall => &[
                ("url", "API call requires url in config"),
                ("method", "API call requires method in config"),
            ],
            StepType::Transformation => {
                &[("operation", "Transformation requires operation in config")]
            }
            StepType::Condition => &[("expression", "Condition requires expression in config")],
            StepType::Notification => {
                &[("recipient", "Notification requires recipient in config")]
            }
        };

        let errors = required
            .iter()
            .filter(|(key, _)| !step.config.get(*key).is_some_and(is_truthy))
            .map(|(_, message)| message.to_string())
            .collect();
        ValidationOutcome::from_errors(errors)
    }
}
