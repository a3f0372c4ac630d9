//! Hourglass
//!
//! Asynchronous job scheduling and execution engine with a pooled job store
//! and a sequential workflow engine.

pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod external;
pub mod jobs;
pub mod logger;
pub mod server;
pub mod state;
pub mod utils;
pub mod workflow;

pub use state::AppState;
