pub mod error;
pub mod executor;
pub mod handlers;
pub mod models;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod types;

pub use error::JobError;
pub use executor::JobExecutor;
pub use models::{JobStatusCounts, NewScheduledJob, ScheduledJob, UpdateScheduledJob};
pub use queue::{JobQueue, QueueOptions, TickSummary};
pub use registry::JobRegistry;
pub use scheduler::{JobScheduler, ScheduleOptions, backoff_delay, quantize_to_hour};
pub use types::{
    JobExecutionContext, JobHandler, JobPayload, JobResult, JobStatus, JobType,
};
