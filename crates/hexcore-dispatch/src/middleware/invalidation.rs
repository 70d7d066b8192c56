//! Cache invalidation after commands.

use std::sync::Arc;

use async_trait::async_trait;
use hexcore_core::cache::Cache;
use hexcore_core::error::DomainError;
use hexcore_core::request::RequestKind;
use hexcore_core::transaction::{Database, RequestContext};
use tracing::{debug, warn};

use crate::pipeline::{Middleware, Next, Response};

/// Deletes the keys a command declares stale once the command succeeds.
///
/// Sits outside the transaction middleware so keys are dropped only after
/// the commit. Delete failures are logged and ignored.
pub struct CacheInvalidationMiddleware {
    cache: Arc<dyn Cache>,
}

impl CacheInvalidationMiddleware {
    /// Invalidates through `cache`.
    #[must_use]
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }
}

impl std::fmt::Debug for CacheInvalidationMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInvalidationMiddleware").finish_non_exhaustive()
    }
}

#[async_trait]
impl<D: Database> Middleware<D> for CacheInvalidationMiddleware {
    fn name(&self) -> &'static str {
        "cache_invalidation"
    }

    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        next: Next<'_, D>,
    ) -> Result<Response, DomainError> {
        let response = next.run(ctx).await?;
        if next.kind() == RequestKind::Command {
            for key in next.message().invalidates() {
                match self.cache.delete(&key).await {
                    Ok(()) => debug!(%key, "cache key invalidated"),
                    Err(err) => warn!(%key, error = %err, "failed to invalidate cache key"),
                }
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hexcore_test_support::{FailingCache, RecordingCache, ScriptedDatabase};

    use super::*;
    use crate::Dispatcher;
    use crate::testing::{ScriptedHandler, Shared, Touch};

    fn touch(key: &str) -> Touch {
        Touch {
            keys: vec![key.to_owned()],
        }
    }

    #[tokio::test]
    async fn test_successful_command_drops_declared_keys() {
        // Arrange
        let cache = Arc::new(RecordingCache::default());
        cache.insert("user:1", "{}");
        cache.insert("user:2", "{}");
        let dispatcher = Dispatcher::<ScriptedDatabase>::builder()
            .register::<Touch, _>(Shared(Arc::new(ScriptedHandler::default())))
            .unwrap()
            .command_middleware(CacheInvalidationMiddleware::new(cache.clone()))
            .build();

        // Act
        dispatcher.dispatch(touch("user:1")).await.unwrap();

        // Assert
        assert!(cache.value("user:1").is_none());
        assert!(cache.value("user:2").is_some());
    }

    #[tokio::test]
    async fn test_failed_command_keeps_cache() {
        let cache = Arc::new(RecordingCache::default());
        cache.insert("user:1", "{}");
        let handler = ScriptedHandler::failing_with(vec![DomainError::Validation("bad".into())]);
        let dispatcher = Dispatcher::<ScriptedDatabase>::builder()
            .register::<Touch, _>(Shared(Arc::new(handler)))
            .unwrap()
            .command_middleware(CacheInvalidationMiddleware::new(cache.clone()))
            .build();

        let result = dispatcher.dispatch(touch("user:1")).await;

        assert!(result.is_err());
        assert!(cache.value("user:1").is_some());
    }

    #[tokio::test]
    async fn test_cache_outage_does_not_fail_command() {
        let dispatcher = Dispatcher::<ScriptedDatabase>::builder()
            .register::<Touch, _>(Shared(Arc::new(ScriptedHandler::default())))
            .unwrap()
            .command_middleware(CacheInvalidationMiddleware::new(Arc::new(FailingCache)))
            .build();

        let result = dispatcher.dispatch(touch("user:1")).await;

        assert_eq!(result.unwrap().0, 1);
    }
}
