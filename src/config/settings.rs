//! Configuration settings structures
//!
//! All sections can be loaded from TOML files and `HOURGLASS_*`
//! environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::db::IsolationLevel;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "hourglass".to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_pool_size() -> usize {
    200
}

fn default_connection_timeout_ms() -> u64 {
    10_000
}

fn default_query_latency_ms() -> u64 {
    10
}

fn default_query_jitter_ms() -> u64 {
    40
}

fn default_transaction_timeout_ms() -> u64 {
    60_000
}

fn default_transaction_max_retries() -> u32 {
    3
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_concurrency() -> usize {
    10
}

fn default_job_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_latency_scale() -> f64 {
    1.0
}

fn default_cache_max_size() -> usize {
    10_000
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_validation_url() -> String {
    "https://validation-service.external/validate".to_string()
}

fn default_validation_timeout_secs() -> u64 {
    30
}

fn default_validation_latency_ms() -> u64 {
    20_000
}

fn default_validation_jitter_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/hourglass.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Database Configuration
// ============================================================================

/// Defaults applied by the transaction coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Upper bound for one unit of work, in milliseconds
    #[serde(default = "default_transaction_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub isolation_level: IsolationLevel,

    /// Attempts made when the work keeps hitting serialization conflicts
    #[serde(default = "default_transaction_max_retries")]
    pub max_retries: u32,
}

impl TransactionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_transaction_timeout_ms(),
            isolation_level: IsolationLevel::default(),
            max_retries: default_transaction_max_retries(),
        }
    }
}

/// Connection pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Pool capacity: maximum number of connections handed out at once
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// How long `acquire` waits in the queue before failing, in milliseconds
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// Simulated base latency of one statement, in milliseconds
    #[serde(default = "default_query_latency_ms")]
    pub query_latency_ms: u64,

    /// Random extra latency added on top of the base, in milliseconds
    #[serde(default = "default_query_jitter_ms")]
    pub query_jitter_ms: u64,

    #[serde(default)]
    pub transaction: TransactionConfig,
}

impl DatabaseConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            connection_timeout_ms: default_connection_timeout_ms(),
            query_latency_ms: default_query_latency_ms(),
            query_jitter_ms: default_query_jitter_ms(),
            transaction: TransactionConfig::default(),
        }
    }
}

// ============================================================================
// Jobs Configuration
// ============================================================================

/// Job queue and scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Whether the polling queue is started by the worker
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between two polls of the job store
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Concurrency hint reported at startup
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Timeout budget given to each execution attempt, in milliseconds
    #[serde(default = "default_job_timeout_ms")]
    pub job_timeout_ms: u64,

    /// `max_retries` for jobs scheduled without an explicit value
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,

    /// Reschedule retryable failed jobs at the end of every poll
    #[serde(default = "default_true")]
    pub retry_sweep: bool,

    /// Multiplier applied to the simulated handler latencies (0 disables them)
    #[serde(default = "default_latency_scale")]
    pub latency_scale: f64,
}

impl JobsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval_secs(),
            concurrency: default_concurrency(),
            job_timeout_ms: default_job_timeout_ms(),
            default_max_retries: default_max_retries(),
            retry_sweep: true,
            latency_scale: default_latency_scale(),
        }
    }
}

// ============================================================================
// Cache Configuration
// ============================================================================

/// Memory cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries in the cache
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,

    /// Default and maximum time-to-live in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_cache_max_size(),
            ttl_seconds: default_cache_ttl(),
        }
    }
}

/// Cache configuration; a disabled cache stores nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub memory: MemoryCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            memory: MemoryCacheConfig::default(),
        }
    }
}

// ============================================================================
// External validation service
// ============================================================================

/// Workflow validation service client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationServiceConfig {
    /// Consult the service before running a workflow
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_validation_url")]
    pub url: String,

    #[serde(default = "default_validation_timeout_secs")]
    pub timeout_secs: u64,

    /// Simulated round-trip latency, in milliseconds
    #[serde(default = "default_validation_latency_ms")]
    pub latency_ms: u64,

    #[serde(default = "default_validation_jitter_ms")]
    pub jitter_ms: u64,
}

impl ValidationServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ValidationServiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_validation_url(),
            timeout_secs: default_validation_timeout_secs(),
            latency_ms: default_validation_latency_ms(),
            jitter_ms: default_validation_jitter_ms(),
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

/// Console output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            colored: true,
        }
    }
}

/// File output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: true,
            format: default_log_format(),
        }
    }
}

/// Logger configuration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime `LoggerConfig`
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let format = self
            .file
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::validation("logger.file.format", e.to_string()))?;

        let file = FileConfig {
            enabled: self.file.enabled,
            path: PathBuf::from(self.file.path),
            append: self.file.append,
            format,
        };
        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);

        LoggerConfig::new(console, file, self.level)
            .map_err(|e| ConfigError::validation("logger", e.to_string()))
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub validation_service: ValidationServiceConfig,

    #[serde(default)]
    pub logger: LoggerSettings,
}
