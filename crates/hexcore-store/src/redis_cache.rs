//! Redis-backed cache.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::debug;

use hexcore_core::cache::Cache;
use hexcore_core::error::DomainError;

fn redis_error(context: &str, err: &redis::RedisError) -> DomainError {
    DomainError::Infrastructure(format!("{context}: {err}"))
}

/// Cache over a shared Redis connection.
#[derive(Clone)]
pub struct RedisCache {
    conn_manager: ConnectionManager,
}

impl RedisCache {
    /// Connects to `redis_url`, e.g. `redis://127.0.0.1:6379`.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` if the client or connection cannot be created.
    pub async fn connect(redis_url: &str) -> Result<Self, DomainError> {
        let client =
            Client::open(redis_url).map_err(|e| redis_error("failed to create Redis client", &e))?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| redis_error("failed to connect to Redis", &e))?;
        Ok(Self { conn_manager })
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let mut conn = self.conn_manager.clone();
        conn.get(key)
            .await
            .map_err(|e| redis_error("cache read failed", &e))
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let mut conn = self.conn_manager.clone();
        let result: redis::RedisResult<()> = match ttl {
            Some(ttl) => conn.set_ex(key, value, ttl.as_secs().max(1)).await,
            None => conn.set(key, value).await,
        };
        result.map_err(|e| redis_error("cache write failed", &e))
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| redis_error("cache delete failed", &e))?;
        Ok(())
    }

    async fn increment(
        &self,
        key: &str,
        by: i64,
        expiry: Option<Duration>,
    ) -> Result<i64, DomainError> {
        let mut conn = self.conn_manager.clone();
        let Some(expiry) = expiry else {
            return conn
                .incr(key, by)
                .await
                .map_err(|e| redis_error("cache increment failed", &e));
        };

        let (value, ttl): (i64, i64) = redis::pipe()
            .atomic()
            .incr(key, by)
            .ttl(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("cache increment failed", &e))?;
        if lacks_expiry(ttl) {
            let seconds = i64::try_from(expiry.as_secs().max(1)).unwrap_or(i64::MAX);
            let _: () = conn
                .expire(key, seconds)
                .await
                .map_err(|e| redis_error("cache expire failed", &e))?;
            debug!(key, seconds, "cache counter expiry set");
        }
        Ok(value)
    }
}

/// `TTL` answers -1 for a key that exists without an expiry.
fn lacks_expiry(ttl: i64) -> bool {
    ttl == -1
}
