//! Error types for modloc
//!
//! This module provides the error taxonomy for the library:
//! - Domain-specific error types (Batch, Database, Provider)
//! - Failure classification for the execution controller (unit-local vs
//!   transient vs batch-fatal provider failures)
//! - Context information (batch id, operation, current state)

use thiserror::Error;

/// Result type alias for modloc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for modloc
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "parallel_batches")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Batch planning or lifecycle error
    #[error("batch error: {0}")]
    Batch(#[from] BatchError),

    /// Translation provider error surfaced to the caller
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new batches
    #[error("shutdown in progress: not accepting new batches")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Batch planning and lifecycle errors
#[derive(Debug, Error)]
pub enum BatchError {
    /// Batch not found in the database
    #[error("batch {id} not found")]
    NotFound {
        /// The batch ID that was not found
        id: i64,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} batch {id} in state {current_state}")]
    InvalidState {
        /// The batch ID that is in an invalid state for the operation
        id: i64,
        /// The operation that was attempted (e.g., "pause", "resume", "retry")
        operation: String,
        /// The current state that prevents the operation (e.g., "translating", "completed")
        current_state: String,
    },

    /// A batch for the same project-language is already executing
    #[error("project-language {project_language_id} already has an active batch")]
    ProjectLanguageBusy {
        /// The project-language whose batch slot is occupied
        project_language_id: i64,
    },

    /// Retry budget spent; the batch is permanently failed
    #[error("batch {id} has exhausted its retry budget ({retry_count} retries)")]
    RetryExhausted {
        /// The batch ID whose retries are exhausted
        id: i64,
        /// Batch-level retries already consumed
        retry_count: u32,
    },

    /// No untranslated units remain for the project-language
    #[error("project-language {project_language_id} has no untranslated units")]
    NothingToTranslate {
        /// The project-language with nothing left to translate
        project_language_id: i64,
    },

    /// The caller-supplied candidate list contains a duplicate unit id
    #[error("unit {unit_id} appears more than once in the candidate list")]
    DuplicateCandidate {
        /// The duplicated unit id
        unit_id: i64,
    },

    /// The batch header exists but its unit ledger was never written
    #[error("batch {id} is missing its unit ledger: {reason}")]
    LedgerIncomplete {
        /// The batch ID whose unit insert failed
        id: i64,
        /// Why the ledger insert failed
        reason: String,
    },

    /// No retained context to retry with (e.g., after an engine restart)
    #[error("batch {id} has no retained context; build a new context and plan a new batch")]
    MissingContext {
        /// The batch ID lacking a context
        id: i64,
    },
}

/// Translation provider errors
///
/// The classification methods drive the execution controller's partial-failure
/// semantics: unit-local failures mark one unit failed and the batch continues;
/// transient failures are retried with backoff; batch-fatal failures abort the
/// whole batch because no subsequent unit can be expected to succeed.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Authentication or authorization failed
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Provider is misconfigured (unknown model, unsupported language pair)
    #[error("provider configuration error: {0}")]
    Configuration(String),

    /// Network-level failure reaching the provider
    #[error("network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Provider throttled the request
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Provider response could not be interpreted for the submitted units
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// Provider refused to translate the submitted content
    #[error("translation rejected: {0}")]
    Rejected(String),
}

impl ProviderError {
    /// Whether this failure aborts the whole batch.
    ///
    /// Auth and configuration failures will not succeed for any subsequent
    /// unit either, so continuing would burn the rest of the batch.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, ProviderError::Auth(_) | ProviderError::Configuration(_))
    }

    /// Whether this failure is transient and worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_) | ProviderError::Timeout(_) | ProviderError::RateLimited(_)
        )
    }

    /// Whether this failure affects only the submitted unit(s)
    pub fn is_unit_local(&self) -> bool {
        matches!(
            self,
            ProviderError::MalformedResponse(_) | ProviderError::Rejected(_)
        )
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_classification_is_a_partition() {
        let errors = [
            ProviderError::Auth("bad key".into()),
            ProviderError::Configuration("unknown model".into()),
            ProviderError::Network("connection refused".into()),
            ProviderError::Timeout("30s elapsed".into()),
            ProviderError::RateLimited("429".into()),
            ProviderError::MalformedResponse("count mismatch".into()),
            ProviderError::Rejected("content policy".into()),
        ];

        for e in &errors {
            let classes = [e.is_batch_fatal(), e.is_transient(), e.is_unit_local()];
            assert_eq!(
                classes.iter().filter(|c| **c).count(),
                1,
                "{e} must fall into exactly one failure class"
            );
        }
    }

    #[test]
    fn auth_and_configuration_are_batch_fatal() {
        assert!(ProviderError::Auth("x".into()).is_batch_fatal());
        assert!(ProviderError::Configuration("x".into()).is_batch_fatal());
        assert!(!ProviderError::Network("x".into()).is_batch_fatal());
    }

    #[test]
    fn batch_error_messages_name_the_operation_and_state() {
        let err = BatchError::InvalidState {
            id: 7,
            operation: "resume".to_string(),
            current_state: "completed".to_string(),
        };
        assert_eq!(err.to_string(), "cannot resume batch 7 in state completed");
    }
}
