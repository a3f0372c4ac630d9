//! Application state.
//!
//! Builds every long-lived component once and hands them out explicitly.

use std::sync::Arc;

use crate::cache::CacheManager;
use crate::config::Settings;
use crate::db::{JobStore, PooledJobStore, ResourcePool, TransactionOptions};
use crate::external::SimulatedValidationClient;
use crate::jobs::{JobExecutor, JobQueue, JobRegistry, JobScheduler, QueueOptions};
use crate::workflow::{StepRunner, WorkflowExecutor, WorkflowStateManager};

/// Shared components of a running worker.
///
/// Cloning is cheap; every component is reference counted internally.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Connection pool backing the job store
    pub pool: ResourcePool,
    pub store: Arc<PooledJobStore>,
    pub cache: Arc<CacheManager>,
    pub scheduler: Arc<JobScheduler>,
    pub queue: Arc<JobQueue>,
    pub executor: JobExecutor,
    pub workflows: WorkflowExecutor,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let pool = ResourcePool::from_config(&settings.database);
        let store = Arc::new(PooledJobStore::new(
            pool.clone(),
            TransactionOptions::from(&settings.database.transaction),
        ));
        let job_store: Arc<dyn JobStore> = store.clone();

        let cache = Arc::new(CacheManager::new(settings.cache.clone()));

        let registry = Arc::new(JobRegistry::with_latency_scale(settings.jobs.latency_scale));
        let executor = JobExecutor::new(registry);
        let scheduler = Arc::new(JobScheduler::new(
            Arc::clone(&job_store),
            settings.jobs.default_max_retries,
        ));

        let mut queue = JobQueue::new(
            job_store,
            executor.clone(),
            QueueOptions::from(&settings.jobs),
        );
        if settings.jobs.retry_sweep {
            queue = queue.with_retry_sweep(Arc::clone(&scheduler));
        }

        let mut workflows = WorkflowExecutor::new(StepRunner::with_latency_scale(
            settings.jobs.latency_scale,
        ));
        if cache.is_enabled() {
            workflows = workflows.with_state_manager(WorkflowStateManager::new(Arc::clone(&cache)));
        }
        if settings.validation_service.enabled {
            workflows = workflows.with_validation_service(Arc::new(
                SimulatedValidationClient::new(&settings.validation_service),
            ));
        }

        Self {
            settings: Arc::new(settings),
            pool,
            store,
            cache,
            scheduler,
            queue: Arc::new(queue),
            executor,
            workflows,
        }
    }
}
