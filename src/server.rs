//! Worker lifecycle.
//!
//! Starts the job queue, waits for a shutdown signal, then stops polling,
//! drains the connection pool and closes it.

use std::time::Duration;

use tokio::signal;

use crate::config::{Environment, Settings};
use crate::state::AppState;

/// Time allowed for in-flight jobs to give their connections back
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Worker {
    state: AppState,
}

impl Worker {
    pub fn new(settings: Settings) -> Self {
        Self {
            state: AppState::new(settings),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run until Ctrl+C or SIGTERM
    pub async fn run(self) -> anyhow::Result<()> {
        self.start().await?;
        shutdown_signal().await;
        self.shutdown().await
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        let settings = &self.state.settings;
        tracing::info!(
            app_name = %settings.application.name,
            app_version = %settings.application.version,
            environment = %Environment::from_env(),
            "Application starting"
        );
        tracing::info!(
            pool_size = settings.database.pool_size,
            connection_timeout_ms = settings.database.connection_timeout_ms,
            isolation_level = settings.database.transaction.isolation_level.as_sql(),
            "Database pool configured"
        );
        tracing::info!(
            enabled = settings.cache.enabled,
            max_size = settings.cache.memory.max_size,
            "Cache configured"
        );

        if settings.jobs.enabled {
            self.state.queue.start().await?;
        } else {
            tracing::warn!("Job queue disabled by configuration");
        }
        Ok(())
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        tracing::info!("Shutting down worker");
        self.state.queue.stop().await?;

        let pool = &self.state.pool;
        if !pool.drain(DRAIN_TIMEOUT).await {
            let stats = pool.stats();
            tracing::warn!(
                active = stats.active,
                waiting = stats.waiting,
                "Connections still in use after drain timeout"
            );
        }
        pool.close();

        tracing::info!("Worker shutdown complete");
        Ok(())
    }
}

/// Waits for Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
