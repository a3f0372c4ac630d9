use std::sync::Arc;

use crate::cache::CacheManager;
use crate::error::AppResult;
use crate::workflow::models::WorkflowContext;

/// One hour
const STATE_TTL_SECONDS: u64 = 3600;

fn state_key(execution_id: &str) -> String {
    format!("workflow:state:{execution_id}")
}

/// Persists execution contexts to the cache between steps
#[derive(Clone)]
pub struct WorkflowStateManager {
    cache: Arc<CacheManager>,
}

impl WorkflowStateManager {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self { cache }
    }

    pub async fn save_state(&self, execution_id: &str, state: &WorkflowContext) -> AppResult<()> {
        self.cache
            .set_json(&state_key(execution_id), state, Some(STATE_TTL_SECONDS))
            .await
            .inspect_err(|e| {
                tracing::error!(execution_id, error = %e, "Failed to save workflow state");
            })?;

        tracing::debug!(execution_id, keys = state.len(), "Workflow state saved");
        Ok(())
    }

    pub async fn get_state(&self, execution_id: &str) -> AppResult<Option<WorkflowContext>> {
        let state = self
            .cache
            .get_json::<WorkflowContext>(&state_key(execution_id))
            .await
            .inspect_err(|e| {
                tracing::error!(execution_id, error = %e, "Failed to retrieve workflow state");
            })?;

        if state.is_none() {
            tracing::debug!(execution_id, "Workflow state not found");
        }
        Ok(state)
    }

    pub async fn delete_state(&self, execution_id: &str) -> AppResult<()> {
        self.cache.remove(&state_key(execution_id)).await?;
        tracing::debug!(execution_id, "Workflow state deleted");
        Ok(())
    }
}
