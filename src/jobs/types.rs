use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::jobs::error::JobError;
use crate::jobs::models::ScheduledJob;

/// Key/value payload attached to a job
pub type JobPayload = serde_json::Map<String, JsonValue>;

/// Kinds of work the engine knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    DataSync,
    EmailSender,
    ReportGenerator,
    Cleanup,
}

impl JobType {
    pub const ALL: [JobType; 4] = [
        JobType::DataSync,
        JobType::EmailSender,
        JobType::ReportGenerator,
        JobType::Cleanup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::DataSync => "data-sync",
            JobType::EmailSender => "email-sender",
            JobType::ReportGenerator => "report-generator",
            JobType::Cleanup => "cleanup",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|job_type| job_type.as_str() == s)
            .ok_or_else(|| JobError::UnknownJobType(s.to_string()))
    }
}

/// Lifecycle status of a scheduled job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Scheduled,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Scheduled => write!(f, "scheduled"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Execution context passed to handlers
#[derive(Debug, Clone)]
pub struct JobExecutionContext {
    pub job_id: Uuid,
    pub customer_id: String,
    pub start_time: Timestamp,
    /// Budget for one attempt
    pub timeout: Duration,
    pub metadata: HashMap<String, JsonValue>,
    /// Cancelled when the attempt times out
    pub cancellation_token: CancellationToken,
}

impl JobExecutionContext {
    pub fn for_job(job: &ScheduledJob, timeout: Duration) -> Self {
        Self {
            job_id: job.id,
            customer_id: job.customer_id.clone(),
            start_time: Timestamp::now(),
            timeout,
            metadata: HashMap::new(),
            cancellation_token: CancellationToken::new(),
        }
    }
}

/// Outcome of one execution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub success: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
}

impl JobResult {
    pub fn succeeded(duration: Duration, output: JsonValue) -> Self {
        Self {
            success: true,
            duration_ms: duration.as_millis() as u64,
            error: None,
            output: Some(output),
        }
    }

    pub fn failed(duration: Duration, error: impl ToString) -> Self {
        Self {
            success: false,
            duration_ms: duration.as_millis() as u64,
            error: Some(error.to_string()),
            output: None,
        }
    }
}

/// Type-specific job implementation
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> JobType;

    /// Whether `payload` carries every required field
    fn validate(&self, payload: &JobPayload) -> bool;

    /// Run the job. Expected failures are reported through the result.
    async fn execute(&self, job: &ScheduledJob, ctx: &JobExecutionContext) -> JobResult;
}
