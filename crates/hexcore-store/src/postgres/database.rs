use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use hexcore_core::error::DomainError;
use hexcore_core::transaction::Database;

use super::storage_error;

/// Connection pool acting as the transactional backend.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool against `url`.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` if no connection can be made.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(storage_error)?;
        Ok(Self::new(pool))
    }

    /// Applies the workspace migrations.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` if a migration fails.
    pub async fn migrate(&self) -> Result<(), DomainError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::Infrastructure(format!("migration failed: {e}")))?;
        info!("database migrations applied");
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Database for PgDatabase {
    type Handle = sqlx::Transaction<'static, sqlx::Postgres>;

    async fn begin(&self) -> Result<Self::Handle, DomainError> {
        self.pool.begin().await.map_err(storage_error)
    }

    async fn commit(&self, handle: Self::Handle) -> Result<(), DomainError> {
        handle.commit().await.map_err(storage_error)
    }

    async fn rollback(&self, handle: Self::Handle) -> Result<(), DomainError> {
        handle.rollback().await.map_err(storage_error)
    }
}
