//! Aggregate repository.
//!
//! Persists an aggregate as a current-state projection row plus its event
//! history. Both writes go through the transaction attached to the request
//! context, projection first, so a concurrency conflict on append also
//! discards the projection write. Reads come from the projection and never
//! replay events.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::aggregate::AggregateRoot;
use crate::clock::Clock;
use crate::error::DomainError;
use crate::event::StoredEvent;
use crate::event_store::{AggregateHistory, EventStore};
use crate::projection::{ProjectionRow, ProjectionStore, UniqueKey};
use crate::transaction::{Database, RequestContext};

/// An aggregate with a current-state projection.
pub trait Projected: AggregateRoot + Sized {
    /// Projection kind, e.g. `user`.
    const KIND: &'static str;

    /// Serializable current state.
    type Record: Serialize + DeserializeOwned + Send;

    /// Captures current state.
    fn to_record(&self) -> Self::Record;

    /// Rebuilds the aggregate from its projection.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` if the record is not a valid state.
    fn from_record(id: Uuid, version: i64, record: Self::Record) -> Result<Self, DomainError>;

    /// Unique secondary keys, e.g. an email address.
    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }
}

/// Loads and stores one aggregate type.
pub struct AggregateRepository<D: Database, A> {
    events: Arc<dyn EventStore<D>>,
    projections: Arc<dyn ProjectionStore<D>>,
    clock: Arc<dyn Clock>,
    _aggregate: PhantomData<fn() -> A>,
}

impl<D: Database, A: Projected> AggregateRepository<D, A> {
    /// Creates a repository over the given stores.
    #[must_use]
    pub fn new(
        events: Arc<dyn EventStore<D>>,
        projections: Arc<dyn ProjectionStore<D>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            events,
            projections,
            clock,
            _aggregate: PhantomData,
        }
    }

    /// Stores a new aggregate: projection insert, then event append.
    ///
    /// Pending events are cleared only when both writes succeed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransactionState` without an active transaction,
    /// `Conflict` if the aggregate or one of its unique keys exists, or
    /// `ConcurrencyConflict` if its stream is not empty.
    pub async fn save(&self, ctx: &mut RequestContext<D>, aggregate: &mut A) -> Result<(), DomainError> {
        let tx = ctx.transaction()?;
        let row = self.row(aggregate)?;
        self.projections
            .insert(tx, &row, &aggregate.unique_keys())
            .await?;
        let appended = self.append_pending(tx, aggregate).await?;
        ctx.queue_for_publication(appended);
        aggregate.clear_pending_events();
        debug!(kind = A::KIND, aggregate_id = %row.aggregate_id, version = row.version, "aggregate saved");
        Ok(())
    }

    /// Stores changes to an existing aggregate: projection update, then
    /// event append at the aggregate's persisted version.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransactionState` without an active transaction,
    /// `AggregateNotFound` if its projection is gone, or
    /// `ConcurrencyConflict` if another writer got there first.
    pub async fn update(&self, ctx: &mut RequestContext<D>, aggregate: &mut A) -> Result<(), DomainError> {
        if aggregate.pending_events().is_empty() {
            return Ok(());
        }
        let tx = ctx.transaction()?;
        let row = self.row(aggregate)?;
        self.projections
            .update(tx, &row, &aggregate.unique_keys())
            .await?;
        let appended = self.append_pending(tx, aggregate).await?;
        ctx.queue_for_publication(appended);
        aggregate.clear_pending_events();
        debug!(kind = A::KIND, aggregate_id = %row.aggregate_id, version = row.version, "aggregate updated");
        Ok(())
    }

    /// Loads an aggregate from its projection.
    ///
    /// # Errors
    ///
    /// Returns `AggregateNotFound` if no projection exists.
    pub async fn find_by_id(&self, id: Uuid) -> Result<A, DomainError> {
        let row = self
            .projections
            .find(A::KIND, id)
            .await?
            .ok_or(DomainError::AggregateNotFound(id))?;
        Self::restore(row)
    }

    /// Loads an aggregate through one of its unique keys.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` on storage or decoding failure.
    pub async fn find_by_key(&self, name: &str, value: &str) -> Result<Option<A>, DomainError> {
        match self.projections.find_by_key(A::KIND, name, value).await? {
            Some(row) => Self::restore(row).map(Some),
            None => Ok(None),
        }
    }

    /// Pages through aggregates. Returns the page and the total count.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` on storage or decoding failure.
    pub async fn list(&self, offset: u64, limit: u64) -> Result<(Vec<A>, u64), DomainError> {
        let (rows, total) = self.projections.list(A::KIND, offset, limit).await?;
        let aggregates = rows
            .into_iter()
            .map(Self::restore)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((aggregates, total))
    }

    /// Removes the projection. The event history is kept.
    ///
    /// # Errors
    ///
    /// Returns `AggregateNotFound` if no projection exists.
    pub async fn delete(&self, ctx: &mut RequestContext<D>, id: Uuid) -> Result<(), DomainError> {
        let tx = ctx.transaction()?;
        if self.projections.delete(tx, A::KIND, id).await? {
            Ok(())
        } else {
            Err(DomainError::AggregateNotFound(id))
        }
    }

    /// Removes the projection and the whole event history.
    ///
    /// # Errors
    ///
    /// Returns `AggregateNotFound` if neither existed.
    pub async fn hard_delete(&self, ctx: &mut RequestContext<D>, id: Uuid) -> Result<u64, DomainError> {
        let tx = ctx.transaction()?;
        let had_projection = self.projections.delete(tx, A::KIND, id).await?;
        let removed = self.events.hard_delete(tx, id).await?;
        if !had_projection && removed == 0 {
            return Err(DomainError::AggregateNotFound(id));
        }
        debug!(kind = A::KIND, aggregate_id = %id, removed, "aggregate history removed");
        Ok(removed)
    }

    /// Full event history of an aggregate.
    ///
    /// # Errors
    ///
    /// Returns `AggregateNotFound` if the stream is empty.
    pub async fn history(&self, id: Uuid) -> Result<AggregateHistory, DomainError> {
        self.events.history(id).await
    }

    fn row(&self, aggregate: &A) -> Result<ProjectionRow, DomainError> {
        let data = serde_json::to_value(aggregate.to_record()).map_err(|e| {
            DomainError::Infrastructure(format!("projection serialization failed: {e}"))
        })?;
        Ok(ProjectionRow {
            kind: A::KIND.to_owned(),
            aggregate_id: aggregate.aggregate_id(),
            version: aggregate.version(),
            data,
            updated_at: self.clock.now(),
        })
    }

    fn restore(row: ProjectionRow) -> Result<A, DomainError> {
        let record: A::Record = serde_json::from_value(row.data).map_err(|e| {
            DomainError::Infrastructure(format!("projection deserialization failed: {e}"))
        })?;
        A::from_record(row.aggregate_id, row.version, record)
    }

    async fn append_pending(
        &self,
        tx: &mut D::Handle,
        aggregate: &A,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let events = aggregate
            .pending_events()
            .iter()
            .map(StoredEvent::from_domain)
            .collect::<Result<Vec<_>, _>>()?;
        self.events
            .append(tx, aggregate.aggregate_id(), aggregate.persisted_version(), &events)
            .await?;
        Ok(events)
    }
}

impl<D: Database, A> Clone for AggregateRepository<D, A> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
            projections: Arc::clone(&self.projections),
            clock: Arc::clone(&self.clock),
            _aggregate: PhantomData,
        }
    }
}

impl<D: Database, A> std::fmt::Debug for AggregateRepository<D, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateRepository").finish_non_exhaustive()
    }
}
