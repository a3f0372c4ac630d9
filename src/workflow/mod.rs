//! Sequential workflow engine.
//!
//! A [`WorkflowExecutor`] validates a workflow, then drives the
//! [`StepRunner`] through its steps in step-number order. Each step's output
//! is merged into the execution context under `step_<n>_output`; the first
//! failing step ends the execution.

pub mod error;
pub mod executor;
pub mod models;
pub mod state;
pub mod step_runner;
pub mod validator;

pub use error::WorkflowError;
pub use executor::WorkflowExecutor;
pub use models::{
    ExecutionStatus, StepConfig, StepExecutionResult, StepType, Workflow, WorkflowContext,
    WorkflowExecution, WorkflowStatus, WorkflowStep,
};
pub use state::WorkflowStateManager;
pub use step_runner::StepRunner;
pub use validator::{ValidationOutcome, WorkflowValidator};
