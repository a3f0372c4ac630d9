//! CLI argument parsing with clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Job scheduling and workflow execution worker
#[derive(Parser, Debug)]
#[command(name = "hourglass", version)]
#[command(about = "Job scheduling and workflow execution worker")]
#[command(long_about = "
Hourglass polls a job store for due jobs, runs each one through its
type-specific handler under a timeout, and reschedules failures with
exponential backoff.

EXAMPLES:
    # Start the worker with the layered configuration in ./config
    hourglass run

    # Seed one job of each type and run a sample workflow on startup
    hourglass run --demo

    # Use a single configuration file
    hourglass --config /etc/hourglass/production.toml run

    # Poll every 10 seconds with debug logging
    hourglass --verbose run --poll-interval 10

    # Validate configuration and print a summary
    hourglass check
")]
pub struct Cli {
    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Read only this TOML file instead of the layered configuration
    /// directory. Environment variables still apply on top.
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection (selects `{environment}.toml`)
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start the worker and run until Ctrl+C or SIGTERM
    Run {
        /// Seed one job of each type and execute a sample workflow
        #[arg(long)]
        demo: bool,

        /// Seconds between polls of the job store
        #[arg(long, value_name = "SECONDS", value_parser = super::validation::validate_poll_interval)]
        poll_interval: Option<u64>,

        /// Log level override; takes precedence over --verbose/--quiet
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,
    },
    /// Validate configuration and print a summary
    Check,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    Test,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => "error".to_string(),
            LogLevel::Warn => "warn".to_string(),
            LogLevel::Info => "info".to_string(),
            LogLevel::Debug => "debug".to_string(),
            LogLevel::Trace => "trace".to_string(),
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Test => crate::config::Environment::Test,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
        }
    }
}
