use thiserror::Error;

use crate::error::AppError;

/// Reasons a workflow execution ends in `failed`
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Workflow validation failed: {}", .0.join("; "))]
    InvalidWorkflow(Vec<String>),

    #[error("Workflow rejected by validation service: {}", .0.join("; "))]
    Rejected(Vec<String>),

    /// The step's config lacks required entries
    #[error("{}", .0.join("; "))]
    InvalidStepConfig(Vec<String>),

    #[error("Step timed out after {timeout_ms}ms")]
    StepTimeout { timeout_ms: u64 },

    #[error(transparent)]
    App(#[from] AppError),
}
