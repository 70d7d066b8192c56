//! `PostgreSQL` adapters.

mod database;
mod event_store;
mod projection_store;

pub use database::PgDatabase;
pub use event_store::PgEventStore;
pub use projection_store::PgProjectionStore;

use hexcore_core::error::DomainError;

/// Maps a driver error to a retryable storage failure.
pub(crate) fn storage_error(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("database error: {err}"))
}

/// Name of the unique constraint `err` violated, if it is a unique violation.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Some(db.constraint().unwrap_or_default().to_owned())
        }
        _ => None,
    }
}
