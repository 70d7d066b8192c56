use async_trait::async_trait;
use uuid::Uuid;

use hexcore_core::error::DomainError;
use hexcore_core::event::StoredEvent;
use hexcore_core::event_store::EventStore;

use super::database::{InMemoryDatabase, MemoryTransaction, Write};

/// Event store over an [`InMemoryDatabase`].
#[derive(Debug, Clone)]
pub struct InMemoryEventStore {
    database: InMemoryDatabase,
}

impl InMemoryEventStore {
    /// Creates a store sharing `database`'s state.
    #[must_use]
    pub fn new(database: &InMemoryDatabase) -> Self {
        Self {
            database: database.clone(),
        }
    }
}

#[async_trait]
impl EventStore<InMemoryDatabase> for InMemoryEventStore {
    async fn append(
        &self,
        tx: &mut MemoryTransaction,
        stream_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }
        self.database.stage(
            tx,
            Write::Append {
                stream_id,
                expected_version,
                events: events.to_vec(),
            },
        )?;
        Ok(())
    }

    async fn load_from(
        &self,
        stream_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let state = self.database.lock();
        Ok(state
            .events
            .get(&stream_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.sequence_number > from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn hard_delete(
        &self,
        tx: &mut MemoryTransaction,
        stream_id: Uuid,
    ) -> Result<u64, DomainError> {
        self.database.stage(tx, Write::DeleteStream { stream_id })
    }
}
