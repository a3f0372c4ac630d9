//! Check command handler

use crate::config::Settings;
use crate::error::AppResult;

/// Validates configuration and prints what a worker would run with
pub struct CheckCommandHandler {
    config: Settings,
}

impl CheckCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> AppResult<()> {
        self.config.validate()?;
        for line in self.summary() {
            println!("✓ {line}");
        }
        println!("Configuration is valid");
        Ok(())
    }

    fn summary(&self) -> Vec<String> {
        let c = &self.config;
        vec![
            format!("Application: {} {}", c.application.name, c.application.version),
            format!(
                "Pool: {} connections, {}ms acquire timeout",
                c.database.pool_size, c.database.connection_timeout_ms
            ),
            format!(
                "Transactions: {} isolation, {}ms timeout, {} retries",
                c.database.transaction.isolation_level.as_sql(),
                c.database.transaction.timeout_ms,
                c.database.transaction.max_retries
            ),
            format!(
                "Jobs: {} every {}s, {}ms timeout, retry sweep {}",
                if c.jobs.enabled { "polling" } else { "disabled" },
                c.jobs.poll_interval_secs,
                c.jobs.job_timeout_ms,
                if c.jobs.retry_sweep { "on" } else { "off" }
            ),
            format!(
                "Cache: {} (max {} entries, {}s TTL)",
                if c.cache.enabled { "memory" } else { "disabled" },
                c.cache.memory.max_size,
                c.cache.memory.ttl_seconds
            ),
            format!(
                "Validation service: {}",
                if c.validation_service.enabled {
                    c.validation_service.url.as_str()
                } else {
                    "disabled"
                }
            ),
            format!("Logger: level {}", c.logger.level),
        ]
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
