//! Cache port.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DomainError;

/// How a query result may be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// Cache key for the result.
    pub key: String,
    /// Time to live. `None` falls back to the pipeline default.
    pub ttl: Option<Duration>,
}

impl CachePolicy {
    /// Caches under `key` with an explicit time to live.
    #[must_use]
    pub fn new(key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            ttl: Some(ttl),
        }
    }
}

/// Key/value cache with expiry.
///
/// Values are opaque strings; callers choose the encoding.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Stores `value` under `key`. A `ttl` of `None` never expires.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>)
    -> Result<(), DomainError>;

    /// Removes `key`. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), DomainError>;

    /// Adds `by` to the integer at `key` and returns the new value.
    ///
    /// A missing key counts from zero and gets `expiry` applied.
    async fn increment(
        &self,
        key: &str,
        by: i64,
        expiry: Option<Duration>,
    ) -> Result<i64, DomainError>;
}
