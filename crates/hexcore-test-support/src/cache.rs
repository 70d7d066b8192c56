//! Test caches.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hexcore_core::cache::Cache;
use hexcore_core::error::DomainError;

/// A cache whose every call fails with `Infrastructure`.
#[derive(Debug, Default)]
pub struct FailingCache;

fn unavailable() -> DomainError {
    DomainError::Infrastructure("cache unavailable".to_owned())
}

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, DomainError> {
        Err(unavailable())
    }

    async fn set(
        &self,
        _key: &str,
        _value: String,
        _ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        Err(unavailable())
    }

    async fn delete(&self, _key: &str) -> Result<(), DomainError> {
        Err(unavailable())
    }

    async fn increment(
        &self,
        _key: &str,
        _by: i64,
        _expiry: Option<Duration>,
    ) -> Result<i64, DomainError> {
        Err(unavailable())
    }
}

/// A map-backed cache that ignores expiry and remembers every TTL it was
/// given.
#[derive(Debug, Default)]
pub struct RecordingCache {
    entries: Mutex<HashMap<String, String>>,
    ttls: Mutex<Vec<(String, Option<Duration>)>>,
}

impl RecordingCache {
    /// Seeds `key` with `value`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.to_owned());
    }

    /// Current value of `key`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Keys and TTLs passed to `set` and `increment`, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn ttls(&self) -> Vec<(String, Option<Duration>)> {
        self.ttls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Cache for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), DomainError> {
        self.ttls.lock().unwrap().push((key.to_owned(), ttl));
        self.entries.lock().unwrap().insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn increment(
        &self,
        key: &str,
        by: i64,
        expiry: Option<Duration>,
    ) -> Result<i64, DomainError> {
        let mut entries = self.entries.lock().unwrap();
        let current = match entries.get(key) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|e| DomainError::Infrastructure(format!("not a counter: {e}")))?,
            None => {
                self.ttls.lock().unwrap().push((key.to_owned(), expiry));
                0
            }
        };
        let next = current + by;
        entries.insert(key.to_owned(), next.to_string());
        Ok(next)
    }
}
