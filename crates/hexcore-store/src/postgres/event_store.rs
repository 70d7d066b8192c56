use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use hexcore_core::error::DomainError;
use hexcore_core::event::StoredEvent;
use hexcore_core::event_store::EventStore;

use super::{PgDatabase, storage_error, unique_violation};
use crate::schema;

/// Event store over the `domain_events` table.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Creates a store reading through `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: Uuid,
    aggregate_id: Uuid,
    event_type: String,
    payload: serde_json::Value,
    sequence_number: i64,
    correlation_id: Uuid,
    causation_id: Uuid,
    occurred_at: DateTime<Utc>,
}

impl From<EventRow> for StoredEvent {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            aggregate_id: row.aggregate_id,
            event_type: row.event_type,
            payload: row.payload,
            sequence_number: row.sequence_number,
            correlation_id: row.correlation_id,
            causation_id: row.causation_id,
            occurred_at: row.occurred_at,
        }
    }
}

#[async_trait]
impl EventStore<PgDatabase> for PgEventStore {
    async fn append(
        &self,
        tx: &mut sqlx::Transaction<'static, sqlx::Postgres>,
        stream_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }

        let (actual,): (i64,) = sqlx::query_as(schema::CURRENT_VERSION)
            .bind(stream_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(storage_error)?;
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: stream_id,
                expected: expected_version,
                actual,
            });
        }

        let mut sequence = expected_version;
        for event in events {
            sequence += 1;
            let inserted = sqlx::query(schema::INSERT_EVENT)
                .bind(event.event_id)
                .bind(stream_id)
                .bind(&event.event_type)
                .bind(&event.payload)
                .bind(sequence)
                .bind(event.correlation_id)
                .bind(event.causation_id)
                .bind(event.occurred_at)
                .execute(&mut **tx)
                .await;
            if let Err(err) = inserted {
                // A concurrent writer committed this version between our
                // read and our insert.
                return Err(match unique_violation(&err).as_deref() {
                    Some(schema::STREAM_VERSION_CONSTRAINT) => DomainError::ConcurrencyConflict {
                        aggregate_id: stream_id,
                        expected: expected_version,
                        actual: sequence,
                    },
                    _ => storage_error(err),
                });
            }
        }

        debug!(
            aggregate_id = %stream_id,
            count = events.len(),
            version = sequence,
            "events appended"
        );
        Ok(())
    }

    async fn load_from(
        &self,
        stream_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(schema::LOAD_EVENTS)
            .bind(stream_id)
            .bind(from_version)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(rows.into_iter().map(StoredEvent::from).collect())
    }

    async fn hard_delete(
        &self,
        tx: &mut sqlx::Transaction<'static, sqlx::Postgres>,
        stream_id: Uuid,
    ) -> Result<u64, DomainError> {
        let result = sqlx::query(schema::DELETE_EVENTS)
            .bind(stream_id)
            .execute(&mut **tx)
            .await
            .map_err(storage_error)?;
        Ok(result.rows_affected())
    }
}
