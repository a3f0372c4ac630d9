//! Command-line interface
//!
//! - Argument parsing with clap
//! - Merging CLI overrides into the loaded configuration
//! - Command handlers for `run` and `check`

pub mod config_merger;
pub mod executor;
pub mod handlers;
pub mod parser;
pub mod validation;

pub use config_merger::ConfigurationMerger;
pub use executor::execute_command;
pub use parser::{Cli, Commands, Environment, LogLevel};
