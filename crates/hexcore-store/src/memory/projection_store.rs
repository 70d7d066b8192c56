use async_trait::async_trait;
use uuid::Uuid;

use hexcore_core::error::DomainError;
use hexcore_core::projection::{ProjectionRow, ProjectionStore, UniqueKey};

use super::database::{InMemoryDatabase, MemoryTransaction, Write};

/// Projection store over an [`InMemoryDatabase`].
#[derive(Debug, Clone)]
pub struct InMemoryProjectionStore {
    database: InMemoryDatabase,
}

impl InMemoryProjectionStore {
    /// Creates a store sharing `database`'s state.
    #[must_use]
    pub fn new(database: &InMemoryDatabase) -> Self {
        Self {
            database: database.clone(),
        }
    }
}

fn owned_keys(keys: &[UniqueKey]) -> Vec<(String, String)> {
    keys.iter()
        .map(|k| (k.name.to_owned(), k.value.clone()))
        .collect()
}

#[async_trait]
impl ProjectionStore<InMemoryDatabase> for InMemoryProjectionStore {
    async fn insert(
        &self,
        tx: &mut MemoryTransaction,
        row: &ProjectionRow,
        keys: &[UniqueKey],
    ) -> Result<(), DomainError> {
        self.database.stage(
            tx,
            Write::InsertProjection {
                row: row.clone(),
                keys: owned_keys(keys),
            },
        )?;
        Ok(())
    }

    async fn update(
        &self,
        tx: &mut MemoryTransaction,
        row: &ProjectionRow,
        keys: &[UniqueKey],
    ) -> Result<(), DomainError> {
        self.database.stage(
            tx,
            Write::UpdateProjection {
                row: row.clone(),
                keys: owned_keys(keys),
            },
        )?;
        Ok(())
    }

    async fn delete(
        &self,
        tx: &mut MemoryTransaction,
        kind: &str,
        aggregate_id: Uuid,
    ) -> Result<bool, DomainError> {
        let removed = self.database.stage(
            tx,
            Write::DeleteProjection {
                kind: kind.to_owned(),
                aggregate_id,
            },
        )?;
        Ok(removed > 0)
    }

    async fn find(
        &self,
        kind: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<ProjectionRow>, DomainError> {
        let state = self.database.lock();
        Ok(state.projections.get(&(kind.to_owned(), aggregate_id)).cloned())
    }

    async fn find_by_key(
        &self,
        kind: &str,
        name: &str,
        value: &str,
    ) -> Result<Option<ProjectionRow>, DomainError> {
        let state = self.database.lock();
        let key = (kind.to_owned(), name.to_owned(), value.to_owned());
        Ok(state
            .keys
            .get(&key)
            .and_then(|id| state.projections.get(&(kind.to_owned(), *id)))
            .cloned())
    }

    async fn list(
        &self,
        kind: &str,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<ProjectionRow>, u64), DomainError> {
        let state = self.database.lock();
        let rows: Vec<&ProjectionRow> = state
            .projections
            .iter()
            .filter(|((k, _), _)| k == kind)
            .map(|(_, row)| row)
            .collect();
        let total = rows.len() as u64;
        let page = rows
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok((page, total))
    }
}
