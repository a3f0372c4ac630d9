use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jobs::types::{JobPayload, JobStatus, JobType};

// ============================================================================
// ScheduledJob Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJob {
    pub id: Uuid,
    pub job_type: JobType,
    pub customer_id: String,
    pub next_run_at: Timestamp,
    pub status: JobStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub payload: JobPayload,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub last_run_at: Option<Timestamp>,
    pub last_error: Option<String>,
}

impl ScheduledJob {
    /// Whether the retry budget still allows another attempt
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Input for creating a job
#[derive(Debug, Clone)]
pub struct NewScheduledJob {
    pub job_type: JobType,
    pub customer_id: String,
    pub next_run_at: Timestamp,
    pub max_retries: u32,
    pub payload: JobPayload,
}

impl NewScheduledJob {
    pub fn into_job(self, now: Timestamp) -> ScheduledJob {
        ScheduledJob {
            id: Uuid::new_v4(),
            job_type: self.job_type,
            customer_id: self.customer_id,
            next_run_at: self.next_run_at,
            status: JobStatus::Scheduled,
            retry_count: 0,
            max_retries: self.max_retries,
            payload: self.payload,
            created_at: now,
            updated_at: now,
            last_run_at: None,
            last_error: None,
        }
    }
}

/// Partial update of a job; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateScheduledJob {
    pub status: Option<JobStatus>,
    pub next_run_at: Option<Timestamp>,
    pub retry_count: Option<u32>,
    pub last_run_at: Option<Timestamp>,
    pub last_error: Option<Option<String>>,
    pub payload: Option<JobPayload>,
}

impl UpdateScheduledJob {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn apply(self, job: &mut ScheduledJob, now: Timestamp) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(next_run_at) = self.next_run_at {
            job.next_run_at = next_run_at;
        }
        if let Some(retry_count) = self.retry_count {
            job.retry_count = retry_count;
        }
        if let Some(last_run_at) = self.last_run_at {
            job.last_run_at = Some(last_run_at);
        }
        if let Some(last_error) = self.last_error {
            job.last_error = last_error;
        }
        if let Some(payload) = self.payload {
            job.payload = payload;
        }
        job.updated_at = now;
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Number of jobs in each status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStatusCounts {
    pub scheduled: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}

impl JobStatusCounts {
    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Scheduled => self.scheduled += 1,
            JobStatus::Running => self.running += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.scheduled + self.running + self.completed + self.failed
    }
}
