use std::time::Duration;

use thiserror::Error;

use crate::cache::CacheError;
use crate::config::error::ConfigError;

/// Kind of concurrency conflict reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Serialization,
    Deadlock,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::Serialization => write!(f, "serialization failure"),
            ConflictKind::Deadlock => write!(f, "deadlock detected"),
        }
    }
}

/// Application-wide error type.
///
/// Job-level and step-level failures never surface as `AppError` to the
/// polling loop or the step loop; they are folded into result values. This
/// type covers the infrastructure underneath: pool, transactions, store,
/// cache, configuration and external collaborators.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error with entity, field, and value information
    #[error("Resource not found: {entity} with {field}={value}")]
    NotFound {
        entity: String,
        field: String,
        value: String,
    },

    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// No connection became available before the acquire deadline
    #[error("Connection pool timeout after {waited:?} (pool size {pool_size})")]
    PoolTimeout { waited: Duration, pool_size: usize },

    /// The pool was closed while acquiring
    #[error("Connection pool is closed")]
    PoolClosed,

    /// Serialization failure or deadlock; safe to retry the whole transaction
    #[error("Transaction conflict ({kind}): {message}")]
    TransactionConflict { kind: ConflictKind, message: String },

    /// The unit of work exceeded the transaction timeout
    #[error("Transaction {transaction_id} timed out after {timeout:?}")]
    TransactionTimeout {
        transaction_id: String,
        timeout: Duration,
    },

    /// Database operation error with operation context
    #[error("Database operation failed: {operation}")]
    Database {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// Cache backend failure
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// External collaborator failure (validation service, ...)
    #[error("External service error ({service}): {message}")]
    ExternalService { service: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Internal error for unexpected failures
    #[error("Internal error: {source}")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Shorthand for a not-found error.
    pub fn not_found(entity: &str, field: &str, value: impl ToString) -> Self {
        AppError::NotFound {
            entity: entity.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Shorthand for a validation error.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a serialization conflict or a deadlock.
    ///
    /// Wrapped driver errors are classified by message, the way backends
    /// report them (`could not serialize access ...`, `deadlock detected`).
    pub fn is_transaction_conflict(&self) -> bool {
        match self {
            AppError::TransactionConflict { .. } => true,
            AppError::Database { source, .. } | AppError::Internal { source } => {
                let message = source.to_string().to_lowercase();
                message.contains("serializ") || message.contains("deadlock")
            }
            _ => false,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal {
            source: anyhow::Error::from(error),
        }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_variant_is_classified_as_conflict() {
        let err = AppError::TransactionConflict {
            kind: ConflictKind::Deadlock,
            message: "tx_1 waits for tx_2".to_string(),
        };
        assert!(err.is_transaction_conflict());
    }

    #[test]
    fn wrapped_driver_messages_are_classified_by_text() {
        let err = AppError::Database {
            operation: "update scheduled_jobs".to_string(),
            source: anyhow::anyhow!("could not serialize access due to concurrent update"),
        };
        assert!(err.is_transaction_conflict());

        let err = AppError::Database {
            operation: "update scheduled_jobs".to_string(),
            source: anyhow::anyhow!("relation does not exist"),
        };
        assert!(!err.is_transaction_conflict());
    }

    #[test]
    fn other_errors_are_not_conflicts() {
        assert!(!AppError::PoolClosed.is_transaction_conflict());
        assert!(!AppError::validation("payload", "missing").is_transaction_conflict());
    }
}
