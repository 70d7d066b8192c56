use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use hexcore_core::cache::Cache;
use hexcore_core::error::DomainError;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local cache with per-key expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries stored and not yet expired.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|e| e.is_live(now)).count()
    }

    /// Whether no live entry is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        self.lock().insert(key.to_owned(), Entry::new(value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        self.lock().remove(key);
        Ok(())
    }

    async fn increment(
        &self,
        key: &str,
        by: i64,
        expiry: Option<Duration>,
    ) -> Result<i64, DomainError> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                let current: i64 = entry.value.parse().map_err(|_| {
                    DomainError::Infrastructure(format!("cache value at {key} is not an integer"))
                })?;
                let next = current.checked_add(by).ok_or_else(|| {
                    DomainError::Infrastructure(format!("cache counter at {key} would overflow"))
                })?;
                entry.value = next.to_string();
                Ok(next)
            }
            _ => {
                entries.insert(key.to_owned(), Entry::new(by.to_string(), expiry));
                Ok(by)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_increment_past_i64_max_is_an_error() {
        // Arrange
        let cache = MemoryCache::new();
        cache
            .set("login_failures:1", (i64::MAX - 1).to_string(), None)
            .await
            .unwrap();

        // Act
        let last = cache.increment("login_failures:1", 1, None).await;
        let overflow = cache.increment("login_failures:1", 1, None).await;

        // Assert
        assert_eq!(last.unwrap(), i64::MAX);
        assert!(matches!(overflow, Err(DomainError::Infrastructure(msg)) if msg.contains("overflow")));
        assert_eq!(
            cache.get("login_failures:1").await.unwrap(),
            Some(i64::MAX.to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        // Arrange
        let cache = MemoryCache::new();
        cache
            .set("user:1", "ada".to_owned(), Some(Duration::from_secs(60)))
            .await
            .unwrap();

        // Act
        tokio::time::advance(Duration::from_secs(61)).await;

        // Assert
        assert_eq!(cache.get("user:1").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_entry_without_ttl_persists() {
        let cache = MemoryCache::new();
        cache.set("k", "v".to_owned(), None).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_keeps_first_expiry() {
        // Arrange
        let cache = MemoryCache::new();
        let hour = Some(Duration::from_secs(3600));
        cache.increment("login_failures:1", 1, hour).await.unwrap();
        tokio::time::advance(Duration::from_secs(1800)).await;

        // Act
        let second = cache.increment("login_failures:1", 1, hour).await.unwrap();
        tokio::time::advance(Duration::from_secs(1801)).await;

        // Assert
        assert_eq!(second, 2);
        assert_eq!(cache.get("login_failures:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_increment_of_text_value_fails() {
        let cache = MemoryCache::new();
        cache.set("k", "abc".to_owned(), None).await.unwrap();

        let result = cache.increment("k", 1, None).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_delete_of_missing_key_is_ok() {
        let cache = MemoryCache::new();

        assert!(cache.delete("nothing").await.is_ok());
    }
}
