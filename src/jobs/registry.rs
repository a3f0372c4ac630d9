use std::collections::HashMap;
use std::sync::Arc;

use crate::jobs::handlers::{
    CleanupHandler, DataSyncHandler, EmailSenderHandler, ReportGeneratorHandler,
};
use crate::jobs::types::{JobHandler, JobType};

/// Maps each job type to the handler that runs it
#[derive(Clone, Default)]
pub struct JobRegistry {
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four built-in handlers at their nominal latencies
    pub fn with_default_handlers() -> Self {
        Self::with_latency_scale(1.0)
    }

    /// Built-in handlers with stage latencies multiplied by `scale`
    pub fn with_latency_scale(scale: f64) -> Self {
        let mut registry = Self::new();
        registry
            .register(DataSyncHandler::with_latency_scale(scale))
            .register(EmailSenderHandler::with_latency_scale(scale))
            .register(ReportGeneratorHandler::with_latency_scale(scale))
            .register(CleanupHandler::with_latency_scale(scale));
        registry
    }

    /// Register a handler under its own job type, replacing any previous one
    pub fn register<H>(&mut self, handler: H) -> &mut Self
    where
        H: JobHandler + 'static,
    {
        let job_type = handler.job_type();
        if self.handlers.insert(job_type, Arc::new(handler)).is_some() {
            tracing::warn!(job_type = %job_type, "Replacing registered job handler");
        }
        self
    }

    pub fn get(&self, job_type: JobType) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&job_type).cloned()
    }

    pub fn job_types(&self) -> Vec<JobType> {
        let mut types: Vec<JobType> = self.handlers.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }
}
