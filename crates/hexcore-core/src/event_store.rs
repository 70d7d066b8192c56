//! Event store port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::StoredEvent;
use crate::transaction::Database;

/// Full history of one aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateHistory {
    /// The aggregate identifier.
    pub aggregate_id: Uuid,
    /// Every stored event, oldest first.
    pub events: Vec<StoredEvent>,
    /// Version after the last event.
    pub version: i64,
    /// Timestamp of the first event.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last event.
    pub updated_at: DateTime<Utc>,
}

impl AggregateHistory {
    /// Builds a history from a loaded stream. Returns `None` for an empty one.
    #[must_use]
    pub fn from_events(aggregate_id: Uuid, events: Vec<StoredEvent>) -> Option<Self> {
        let first = events.first()?;
        let last = events.last()?;
        let created_at = first.occurred_at;
        let updated_at = last.occurred_at;
        let version = last.sequence_number;
        Some(Self {
            aggregate_id,
            events,
            version,
            created_at,
            updated_at,
        })
    }
}

/// Append-only event log with optimistic concurrency.
///
/// Writes go through the caller's transaction handle so that they commit or
/// roll back together with the projection writes of the same unit of work.
#[async_trait]
pub trait EventStore<D: Database>: Send + Sync {
    /// Appends `events` to `stream_id`.
    ///
    /// `expected_version` is the version the caller last saw. The events are
    /// stored with sequence numbers `expected_version + 1` onwards, in order.
    /// An empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrencyConflict` when the stream is not at
    /// `expected_version`, or `Infrastructure` on storage failure. No events
    /// are written on error.
    async fn append(
        &self,
        tx: &mut D::Handle,
        stream_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError>;

    /// Loads every event with a sequence number above `from_version`, ascending.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` on storage failure.
    async fn load_from(
        &self,
        stream_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Removes every event of `stream_id` and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` on storage failure.
    async fn hard_delete(&self, tx: &mut D::Handle, stream_id: Uuid) -> Result<u64, DomainError>;

    /// Loads the whole stream, ascending. Unknown streams are empty.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` on storage failure.
    async fn load(&self, stream_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        self.load_from(stream_id, 0).await
    }

    /// Loads the stream together with its version and timestamps.
    ///
    /// # Errors
    ///
    /// Returns `AggregateNotFound` for an empty stream.
    async fn history(&self, stream_id: Uuid) -> Result<AggregateHistory, DomainError> {
        let events = self.load(stream_id).await?;
        AggregateHistory::from_events(stream_id, events)
            .ok_or(DomainError::AggregateNotFound(stream_id))
    }
}
