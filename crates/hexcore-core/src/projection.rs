//! Current-state projection port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::transaction::Database;

/// Current-state row for one aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRow {
    /// Aggregate kind, e.g. `user`.
    pub kind: String,
    /// The aggregate identifier.
    pub aggregate_id: Uuid,
    /// Aggregate version the row reflects.
    pub version: i64,
    /// Aggregate state as JSON.
    pub data: serde_json::Value,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

/// A unique secondary key kept next to a projection row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueKey {
    /// Key name, e.g. `email`.
    pub name: &'static str,
    /// Key value.
    pub value: String,
}

impl UniqueKey {
    /// Creates a key.
    #[must_use]
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Storage for projection rows and their unique keys.
#[async_trait]
pub trait ProjectionStore<D: Database>: Send + Sync {
    /// Inserts a new row and claims its unique keys.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the row or any key already exists.
    async fn insert(
        &self,
        tx: &mut D::Handle,
        row: &ProjectionRow,
        keys: &[UniqueKey],
    ) -> Result<(), DomainError>;

    /// Replaces an existing row and its unique keys.
    ///
    /// # Errors
    ///
    /// Returns `AggregateNotFound` if the row does not exist, or `Conflict`
    /// if a key is held by another aggregate.
    async fn update(
        &self,
        tx: &mut D::Handle,
        row: &ProjectionRow,
        keys: &[UniqueKey],
    ) -> Result<(), DomainError>;

    /// Removes a row and its keys. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` on storage failure.
    async fn delete(
        &self,
        tx: &mut D::Handle,
        kind: &str,
        aggregate_id: Uuid,
    ) -> Result<bool, DomainError>;

    /// Reads a row by aggregate id.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` on storage failure.
    async fn find(&self, kind: &str, aggregate_id: Uuid)
    -> Result<Option<ProjectionRow>, DomainError>;

    /// Reads a row through one of its unique keys.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` on storage failure.
    async fn find_by_key(
        &self,
        kind: &str,
        name: &str,
        value: &str,
    ) -> Result<Option<ProjectionRow>, DomainError>;

    /// Pages through rows ordered by aggregate id. Returns the page and the
    /// total row count.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` on storage failure.
    async fn list(
        &self,
        kind: &str,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<ProjectionRow>, u64), DomainError>;
}
