use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use hexcore_core::error::DomainError;
use hexcore_core::event::StoredEvent;
use hexcore_core::projection::ProjectionRow;
use hexcore_core::transaction::Database;

/// Committed contents of an [`InMemoryDatabase`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySnapshot {
    /// Event streams by aggregate id, oldest first.
    pub events: BTreeMap<Uuid, Vec<StoredEvent>>,
    /// Projection rows by kind and aggregate id.
    pub projections: BTreeMap<(String, Uuid), ProjectionRow>,
    /// Unique keys as (kind, name, value) pointing at an aggregate id.
    pub keys: BTreeMap<(String, String, String), Uuid>,
}

/// A write waiting for commit.
#[derive(Debug, Clone)]
pub(crate) enum Write {
    Append {
        stream_id: Uuid,
        expected_version: i64,
        events: Vec<StoredEvent>,
    },
    DeleteStream {
        stream_id: Uuid,
    },
    InsertProjection {
        row: ProjectionRow,
        keys: Vec<(String, String)>,
    },
    UpdateProjection {
        row: ProjectionRow,
        keys: Vec<(String, String)>,
    },
    DeleteProjection {
        kind: String,
        aggregate_id: Uuid,
    },
}

impl Write {
    /// Applies the write and returns how many records it touched.
    fn apply(&self, state: &mut MemorySnapshot) -> Result<u64, DomainError> {
        match self {
            Self::Append {
                stream_id,
                expected_version,
                events,
            } => {
                let stream = state.events.entry(*stream_id).or_default();
                let actual = stream.last().map_or(0, |e| e.sequence_number);
                if actual != *expected_version {
                    return Err(DomainError::ConcurrencyConflict {
                        aggregate_id: *stream_id,
                        expected: *expected_version,
                        actual,
                    });
                }
                let mut sequence = actual;
                for event in events {
                    sequence += 1;
                    stream.push(StoredEvent {
                        aggregate_id: *stream_id,
                        sequence_number: sequence,
                        ..event.clone()
                    });
                }
                Ok(events.len() as u64)
            }
            Self::DeleteStream { stream_id } => Ok(state
                .events
                .remove(stream_id)
                .map_or(0, |events| events.len() as u64)),
            Self::InsertProjection { row, keys } => {
                let id = (row.kind.clone(), row.aggregate_id);
                if state.projections.contains_key(&id) {
                    return Err(DomainError::Conflict(format!(
                        "{} {} already exists",
                        row.kind, row.aggregate_id
                    )));
                }
                claim_keys(state, row, keys)?;
                state.projections.insert(id, row.clone());
                Ok(1)
            }
            Self::UpdateProjection { row, keys } => {
                let id = (row.kind.clone(), row.aggregate_id);
                if !state.projections.contains_key(&id) {
                    return Err(DomainError::AggregateNotFound(row.aggregate_id));
                }
                release_keys(state, &row.kind, row.aggregate_id);
                claim_keys(state, row, keys)?;
                state.projections.insert(id, row.clone());
                Ok(1)
            }
            Self::DeleteProjection { kind, aggregate_id } => {
                let removed = state
                    .projections
                    .remove(&(kind.clone(), *aggregate_id))
                    .is_some();
                release_keys(state, kind, *aggregate_id);
                Ok(u64::from(removed))
            }
        }
    }
}

fn claim_keys(
    state: &mut MemorySnapshot,
    row: &ProjectionRow,
    keys: &[(String, String)],
) -> Result<(), DomainError> {
    for (name, value) in keys {
        let key = (row.kind.clone(), name.clone(), value.clone());
        match state.keys.get(&key) {
            Some(holder) if *holder != row.aggregate_id => {
                return Err(DomainError::Conflict(format!("{name} already exists")));
            }
            _ => {
                state.keys.insert(key, row.aggregate_id);
            }
        }
    }
    Ok(())
}

fn release_keys(state: &mut MemorySnapshot, kind: &str, aggregate_id: Uuid) {
    state
        .keys
        .retain(|(k, _, _), holder| !(k == kind && *holder == aggregate_id));
}

/// Uncommitted writes of one unit of work. Dropping it discards them.
#[derive(Debug, Default)]
pub struct MemoryTransaction {
    staged: Vec<Write>,
}

impl MemoryTransaction {
    /// Number of writes waiting for commit.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.staged.len()
    }
}

/// Shared in-process state. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    state: Arc<Mutex<MemorySnapshot>>,
}

impl InMemoryDatabase {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed state.
    #[must_use]
    pub fn snapshot(&self) -> MemorySnapshot {
        self.lock().clone()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, MemorySnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks `write` against the committed state plus the writes already
    /// staged on `tx`, then stages it.
    pub(crate) fn stage(&self, tx: &mut MemoryTransaction, write: Write) -> Result<u64, DomainError> {
        let mut view = self.snapshot();
        for staged in &tx.staged {
            staged.apply(&mut view)?;
        }
        let touched = write.apply(&mut view)?;
        tx.staged.push(write);
        Ok(touched)
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    type Handle = MemoryTransaction;

    async fn begin(&self) -> Result<Self::Handle, DomainError> {
        Ok(MemoryTransaction::default())
    }

    async fn commit(&self, handle: Self::Handle) -> Result<(), DomainError> {
        let mut state = self.lock();
        let mut next = state.clone();
        for write in &handle.staged {
            write.apply(&mut next)?;
        }
        *state = next;
        debug!(writes = handle.staged.len(), "memory transaction committed");
        Ok(())
    }

    async fn rollback(&self, handle: Self::Handle) -> Result<(), DomainError> {
        debug!(writes = handle.staged.len(), "memory transaction discarded");
        Ok(())
    }
}
