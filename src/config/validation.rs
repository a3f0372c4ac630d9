//! Configuration validation logic
//!
//! Range and consistency checks for every configuration section.

use crate::config::error::ConfigError;
use crate::config::settings::{
    CacheConfig, DatabaseConfig, JobsConfig, Settings, TransactionConfig, ValidationServiceConfig,
};

impl TransactionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::validation(
                "database.transaction.timeout_ms",
                "Transaction timeout must be greater than 0.",
            ));
        }

        if self.max_retries == 0 {
            return Err(ConfigError::validation(
                "database.transaction.max_retries",
                "At least one transaction attempt is required.",
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// # Validation Rules
    /// - Pool size must be greater than 0
    /// - Connection timeout must be greater than 0
    /// - Transaction defaults must be valid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::validation(
                "database.pool_size",
                "Pool size must be greater than 0.",
            ));
        }

        if self.connection_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "database.connection_timeout_ms",
                "Connection timeout must be greater than 0 milliseconds.",
            ));
        }

        self.transaction.validate()
    }
}

impl JobsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::validation(
                "jobs.poll_interval_secs",
                "Poll interval must be at least 1 second.",
            ));
        }

        if self.concurrency == 0 {
            return Err(ConfigError::validation(
                "jobs.concurrency",
                "Concurrency must be greater than 0.",
            ));
        }

        if self.job_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "jobs.job_timeout_ms",
                "Job timeout must be greater than 0 milliseconds.",
            ));
        }

        if !self.latency_scale.is_finite() || self.latency_scale < 0.0 {
            return Err(ConfigError::ValidationError {
                field: "jobs.latency_scale".to_string(),
                message: format!(
                    "Latency scale must be a non-negative number, got {}.",
                    self.latency_scale
                ),
            });
        }

        Ok(())
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.memory.max_size == 0 {
            return Err(ConfigError::validation(
                "cache.memory.max_size",
                "Cache size must be greater than 0 when the cache is enabled.",
            ));
        }

        if self.enabled && self.memory.ttl_seconds == 0 {
            return Err(ConfigError::validation(
                "cache.memory.ttl_seconds",
                "Cache TTL must be greater than 0 seconds when the cache is enabled.",
            ));
        }

        Ok(())
    }
}

impl ValidationServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }

        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ConfigError::ValidationError {
                field: "validation_service.url".to_string(),
                message: format!("Expected an http(s) URL, got '{}'.", self.url),
            });
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::validation(
                "validation_service.timeout_secs",
                "Timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl Settings {
    /// Validate all configuration sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application.name.trim().is_empty() {
            return Err(ConfigError::validation(
                "application.name",
                "Application name cannot be empty.",
            ));
        }

        self.database.validate()?;
        self.jobs.validate()?;
        self.cache.validate()?;
        self.validation_service.validate()?;
        self.logger.clone().into_logger_config()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn rejects_empty_pool() {
        let mut settings = Settings::default();
        settings.database.pool_size = 0;

        match settings.validate() {
            Err(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field, "database.pool_size");
            }
            other => panic!("Expected pool_size validation error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_zero_transaction_attempts() {
        let mut settings = Settings::default();
        settings.database.transaction.max_retries = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validation_service_url_checked_only_when_enabled() {
        let mut settings = Settings::default();
        settings.validation_service.url = "ftp://nowhere".to_string();
        assert!(settings.validate().is_ok());

        settings.validation_service.enabled = true;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_negative_latency_scale() {
        let mut settings = Settings::default();
        settings.jobs.latency_scale = -0.5;
        assert!(settings.validate().is_err());
    }

    proptest! {
        #[test]
        fn positive_pool_settings_validate(
            pool_size in 1usize..=1000,
            timeout_ms in 1u64..=120_000,
            poll in 1u64..=3600,
        ) {
            let mut settings = Settings::default();
            settings.database.pool_size = pool_size;
            settings.database.connection_timeout_ms = timeout_ms;
            settings.jobs.poll_interval_secs = poll;
            prop_assert!(settings.validate().is_ok());
        }
    }
}
