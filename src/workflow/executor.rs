use std::sync::Arc;

use crate::external::WorkflowValidationService;
use crate::utils::random_id;
use crate::workflow::error::WorkflowError;
use crate::workflow::models::{Workflow, WorkflowContext, WorkflowExecution, WorkflowStep};
use crate::workflow::state::WorkflowStateManager;
use crate::workflow::step_runner::StepRunner;
use crate::workflow::validator::WorkflowValidator;

/// Runs the steps of a workflow in order, halting on the first failure.
#[derive(Clone, Default)]
pub struct WorkflowExecutor {
    step_runner: StepRunner,
    validator: WorkflowValidator,
    validation_service: Option<Arc<dyn WorkflowValidationService>>,
    state: Option<WorkflowStateManager>,
}

impl WorkflowExecutor {
    pub fn new(step_runner: StepRunner) -> Self {
        Self {
            step_runner,
            ..Default::default()
        }
    }

    /// Consult `service` before any step runs
    pub fn with_validation_service(mut self, service: Arc<dyn WorkflowValidationService>) -> Self {
        self.validation_service = Some(service);
        self
    }

    /// Save the context after every completed step
    pub fn with_state_manager(mut self, state: WorkflowStateManager) -> Self {
        self.state = Some(state);
        self
    }

    /// Execute `workflow` starting from `context`.
    ///
    /// Always returns a terminal execution; errors end up in its `error`.
    pub async fn execute(&self, workflow: &Workflow, context: WorkflowContext) -> WorkflowExecution {
        let mut execution = WorkflowExecution::start(random_id("exec"), workflow, context);
        tracing::info!(
            execution_id = %execution.id,
            workflow_id = %workflow.id,
            customer_id = %workflow.customer_id,
            step_count = workflow.steps.len(),
            "Starting workflow execution"
        );

        match self.run(workflow, &mut execution).await {
            Ok(()) if execution.is_terminal() => {}
            Ok(()) => {
                execution.complete();
                let duration_ms = execution
                    .completed_at
                    .map(|end| end.duration_since(execution.started_at).as_millis())
                    .unwrap_or_default();
                tracing::info!(
                    execution_id = %execution.id,
                    workflow_id = %workflow.id,
                    duration_ms = duration_ms as i64,
                    "Workflow execution completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    execution_id = %execution.id,
                    workflow_id = %workflow.id,
                    error = %e,
                    "Workflow execution error"
                );
                execution.fail(e.to_string());
            }
        }
        execution
    }

    async fn run(
        &self,
        workflow: &Workflow,
        execution: &mut WorkflowExecution,
    ) -> Result<(), WorkflowError> {
        self.validate(workflow).await?;

        let mut steps: Vec<&WorkflowStep> = workflow.steps.iter().collect();
        steps.sort_by_key(|step| step.step_number);

        for step in steps {
            execution.current_step = Some(step.step_number);
            tracing::debug!(
                execution_id = %execution.id,
                workflow_id = %workflow.id,
                step_number = step.step_number,
                step_name = %step.name,
                "Executing workflow step"
            );

            let result = self.step_runner.execute_step(step, &execution.context).await;
            let output = result.output.clone();
            let error = result.error.clone();
            execution.step_results.push(result);

            let Some(output) = output.filter(|_| error.is_none()) else {
                let error = error.unwrap_or_else(|| "Step produced no output".to_string());
                tracing::error!(
                    execution_id = %execution.id,
                    workflow_id = %workflow.id,
                    step_number = step.step_number,
                    error = %error,
                    "Workflow step failed"
                );
                execution.fail(error);
                return Ok(());
            };

            execution.context.insert(step.output_key(), output);
            if let Some(state) = &self.state {
                state.save_state(&execution.id, &execution.context).await?;
            }
        }
        Ok(())
    }

    async fn validate(&self, workflow: &Workflow) -> Result<(), WorkflowError> {
        let local = self.validator.validate_workflow(workflow);
        if !local.valid {
            return Err(WorkflowError::InvalidWorkflow(local.errors));
        }

        if let Some(service) = &self.validation_service {
            let report = service.validate_workflow(workflow).await?;
            if !report.valid {
                return Err(WorkflowError::Rejected(report.errors));
            }
            if !report.warnings.is_empty() {
                tracing::info!(
                    workflow_id = %workflow.id,
                    warnings = ?report.warnings,
                    "Workflow passed validation with warnings"
                );
            }
        }
        Ok(())
    }
}
