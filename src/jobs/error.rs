use thiserror::Error;

use crate::jobs::types::JobType;

/// Reasons a single job attempt can fail.
///
/// These never escape the executor; they are folded into a failed
/// `JobResult` whose `error` is the display string.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("No handler registered for job type: {0}")]
    UnknownJobType(String),

    #[error("Invalid payload for job type: {0}")]
    InvalidPayload(JobType),

    #[error("Job execution timeout after {timeout_ms}ms")]
    ExecutionTimeout { timeout_ms: u64 },

    #[error("Job execution failed: {0}")]
    ExecutionFailed(String),
}
