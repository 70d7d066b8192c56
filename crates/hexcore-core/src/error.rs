//! Domain error types.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::transaction::TransactionState;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// A non-aggregate resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// A request failed validation before reaching its handler.
    #[error("validation error: {0}")]
    Validation(String),

    /// A uniqueness rule was broken, e.g. a duplicate email.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A business rule rejected an aggregate operation.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The caller could not be authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// No handler is registered for the request type.
    #[error("no handler registered for {0}")]
    HandlerNotFound(&'static str),

    /// A handler was registered twice for the same request type.
    #[error("handler already registered for {0}")]
    DuplicateHandler(&'static str),

    /// A transaction operation was attempted from the wrong state.
    #[error("cannot {operation} a transaction in state {state}")]
    InvalidTransactionState {
        /// State the transaction was in.
        state: TransactionState,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// The request did not complete within its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),

    /// Rolling back after a failure also failed.
    #[error("rollback failed: {rollback} (original error: {original})")]
    RollbackFailed {
        /// The error that triggered the rollback.
        original: Box<DomainError>,
        /// The error raised by the rollback itself.
        rollback: Box<DomainError>,
    },
}

impl DomainError {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AggregateNotFound(_) | Self::NotFound(_) => "not_found",
            Self::ConcurrencyConflict { .. } => "concurrency_conflict",
            Self::Validation(_) => "validation_failed",
            Self::Conflict(_) => "conflict",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::Unauthorized(_) => "unauthorized",
            Self::HandlerNotFound(_) => "handler_not_found",
            Self::DuplicateHandler(_) => "duplicate_handler",
            Self::InvalidTransactionState { .. } => "invalid_transaction_state",
            Self::Timeout(_) => "timeout",
            Self::Infrastructure(_) => "storage_unavailable",
            Self::RollbackFailed { .. } => "rollback_failed",
        }
    }

    /// Whether a retry of the same request could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Infrastructure(_) | Self::Timeout(_))
    }
}
