use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use hexcore_core::error::DomainError;
use hexcore_core::projection::{ProjectionRow, ProjectionStore, UniqueKey};

use super::{PgDatabase, storage_error, unique_violation};
use crate::schema;

type PgTransaction = sqlx::Transaction<'static, sqlx::Postgres>;

/// Projection store over the `projections` and `projection_keys` tables.
#[derive(Debug, Clone)]
pub struct PgProjectionStore {
    pool: PgPool,
}

impl PgProjectionStore {
    /// Creates a store reading through `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct Row {
    kind: String,
    aggregate_id: Uuid,
    version: i64,
    data: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl From<Row> for ProjectionRow {
    fn from(row: Row) -> Self {
        Self {
            kind: row.kind,
            aggregate_id: row.aggregate_id,
            version: row.version,
            data: row.data,
            updated_at: row.updated_at,
        }
    }
}

async fn insert_keys(
    tx: &mut PgTransaction,
    row: &ProjectionRow,
    keys: &[UniqueKey],
) -> Result<(), DomainError> {
    for key in keys {
        sqlx::query(schema::INSERT_KEY)
            .bind(&row.kind)
            .bind(key.name)
            .bind(&key.value)
            .bind(row.aggregate_id)
            .execute(&mut **tx)
            .await
            .map_err(|err| match unique_violation(&err) {
                Some(_) => DomainError::Conflict(format!("{} already exists", key.name)),
                None => storage_error(err),
            })?;
    }
    Ok(())
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl ProjectionStore<PgDatabase> for PgProjectionStore {
    async fn insert(
        &self,
        tx: &mut PgTransaction,
        row: &ProjectionRow,
        keys: &[UniqueKey],
    ) -> Result<(), DomainError> {
        sqlx::query(schema::INSERT_PROJECTION)
            .bind(&row.kind)
            .bind(row.aggregate_id)
            .bind(row.version)
            .bind(&row.data)
            .bind(row.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|err| match unique_violation(&err) {
                Some(_) => {
                    DomainError::Conflict(format!("{} {} already exists", row.kind, row.aggregate_id))
                }
                None => storage_error(err),
            })?;
        insert_keys(tx, row, keys).await
    }

    async fn update(
        &self,
        tx: &mut PgTransaction,
        row: &ProjectionRow,
        keys: &[UniqueKey],
    ) -> Result<(), DomainError> {
        let result = sqlx::query(schema::UPDATE_PROJECTION)
            .bind(&row.kind)
            .bind(row.aggregate_id)
            .bind(row.version)
            .bind(&row.data)
            .bind(row.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(storage_error)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::AggregateNotFound(row.aggregate_id));
        }

        sqlx::query(schema::DELETE_KEYS)
            .bind(&row.kind)
            .bind(row.aggregate_id)
            .execute(&mut **tx)
            .await
            .map_err(storage_error)?;
        insert_keys(tx, row, keys).await
    }

    async fn delete(
        &self,
        tx: &mut PgTransaction,
        kind: &str,
        aggregate_id: Uuid,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(schema::DELETE_PROJECTION)
            .bind(kind)
            .bind(aggregate_id)
            .execute(&mut **tx)
            .await
            .map_err(storage_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(
        &self,
        kind: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<ProjectionRow>, DomainError> {
        let row: Option<Row> = sqlx::query_as(schema::FIND_PROJECTION)
            .bind(kind)
            .bind(aggregate_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.map(ProjectionRow::from))
    }

    async fn find_by_key(
        &self,
        kind: &str,
        name: &str,
        value: &str,
    ) -> Result<Option<ProjectionRow>, DomainError> {
        let row: Option<Row> = sqlx::query_as(schema::FIND_PROJECTION_BY_KEY)
            .bind(kind)
            .bind(name)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(row.map(ProjectionRow::from))
    }

    async fn list(
        &self,
        kind: &str,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<ProjectionRow>, u64), DomainError> {
        let rows: Vec<Row> = sqlx::query_as(schema::LIST_PROJECTIONS)
            .bind(kind)
            .bind(to_i64(limit))
            .bind(to_i64(offset))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        let (total,): (i64,) = sqlx::query_as(schema::COUNT_PROJECTIONS)
            .bind(kind)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok((
            rows.into_iter().map(ProjectionRow::from).collect(),
            u64::try_from(total).unwrap_or_default(),
        ))
    }
}
