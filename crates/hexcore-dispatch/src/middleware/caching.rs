//! Query result caching.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hexcore_core::cache::Cache;
use hexcore_core::error::DomainError;
use hexcore_core::request::RequestKind;
use hexcore_core::transaction::{Database, RequestContext};
use tracing::{debug, warn};

use crate::pipeline::{Middleware, Next, Response};

/// Serves queries that declare a cache policy from the cache.
///
/// A hit returns the cached result without calling the handler. A miss, an
/// unreadable entry or a cache failure runs the handler and stores its
/// result; failing to store is logged and otherwise ignored.
pub struct CachingMiddleware {
    cache: Arc<dyn Cache>,
    default_ttl: Duration,
}

impl CachingMiddleware {
    /// Caches through `cache`, using `default_ttl` for policies without one.
    #[must_use]
    pub fn new(cache: Arc<dyn Cache>, default_ttl: Duration) -> Self {
        Self { cache, default_ttl }
    }
}

impl std::fmt::Debug for CachingMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingMiddleware")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<D: Database> Middleware<D> for CachingMiddleware {
    fn name(&self) -> &'static str {
        "caching"
    }

    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        next: Next<'_, D>,
    ) -> Result<Response, DomainError> {
        if next.kind() != RequestKind::Query {
            return next.run(ctx).await;
        }
        let Some(policy) = next.message().cache_policy() else {
            return next.run(ctx).await;
        };

        match self.cache.get(&policy.key).await {
            Ok(Some(raw)) => match next.decode(&raw) {
                Ok(response) => {
                    debug!(key = %policy.key, "cache hit");
                    return Ok(response);
                }
                Err(err) => warn!(key = %policy.key, error = %err, "discarding unreadable cache entry"),
            },
            Ok(None) => debug!(key = %policy.key, "cache miss"),
            Err(err) => warn!(key = %policy.key, error = %err, "cache read failed, treating as miss"),
        }

        let response = next.run(ctx).await?;

        let ttl = policy.ttl.unwrap_or(self.default_ttl);
        match next.encode(&response) {
            Ok(raw) => {
                if let Err(err) = self.cache.set(&policy.key, raw, Some(ttl)).await {
                    warn!(key = %policy.key, error = %err, "failed to cache query result");
                }
            }
            Err(err) => warn!(key = %policy.key, error = %err, "query result is not cacheable"),
        }
        Ok(response)
    }
}
