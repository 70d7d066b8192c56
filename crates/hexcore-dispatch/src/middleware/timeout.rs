//! Request deadline.

use std::time::Duration;

use async_trait::async_trait;
use hexcore_core::error::DomainError;
use hexcore_core::transaction::{Database, RequestContext};
use tracing::warn;

use crate::pipeline::{Middleware, Next, Response};

/// Fails requests that take longer than a fixed duration.
///
/// On expiry the rest of the chain is cancelled by dropping its future. A
/// transaction opened further in is discarded with it, so a late result is
/// never committed.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutMiddleware {
    duration: Duration,
}

impl TimeoutMiddleware {
    /// Bounds every request to `duration`.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl<D: Database> Middleware<D> for TimeoutMiddleware {
    fn name(&self) -> &'static str {
        "timeout"
    }

    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        next: Next<'_, D>,
    ) -> Result<Response, DomainError> {
        let correlation_id = ctx.correlation_id();
        if let Ok(result) = tokio::time::timeout(self.duration, next.run(ctx)).await {
            result
        } else {
            warn!(
                %correlation_id,
                message_type = next.message().message_type(),
                timeout_ms = self.duration.as_secs_f64() * 1000.0,
                "request timed out"
            );
            Err(DomainError::Timeout(self.duration))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hexcore_core::unit_of_work::UnitOfWork;
    use hexcore_test_support::{CallLog, ScriptedDatabase};

    use super::*;
    use crate::Dispatcher;
    use crate::middleware::TransactionMiddleware;
    use crate::testing::{Probe, ScriptedHandler, Shared, Touch};

    #[tokio::test]
    async fn test_slow_request_times_out() {
        // Arrange
        let handler = Arc::new(ScriptedHandler {
            delay: Some(Duration::from_secs(5)),
            ..ScriptedHandler::default()
        });
        let dispatcher = Dispatcher::<ScriptedDatabase>::builder()
            .register::<Probe, _>(Shared(handler))
            .unwrap()
            .query_middleware(TimeoutMiddleware::new(Duration::from_millis(20)))
            .build();

        // Act
        let result = dispatcher.dispatch(Probe::default()).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Timeout(d)) if d == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_fast_request_completes() {
        let dispatcher = Dispatcher::<ScriptedDatabase>::builder()
            .register::<Probe, _>(Shared(Arc::new(ScriptedHandler::default())))
            .unwrap()
            .query_middleware(TimeoutMiddleware::new(Duration::from_secs(1)))
            .build();

        let result = dispatcher.dispatch(Probe::default()).await;

        assert_eq!(result.unwrap().0, 1);
    }

    #[tokio::test]
    async fn test_timed_out_transaction_is_never_committed() {
        // Arrange
        let log = CallLog::default();
        let handler = Arc::new(ScriptedHandler {
            delay: Some(Duration::from_secs(5)),
            transactional: true,
            log: log.clone(),
            ..ScriptedHandler::default()
        });
        let unit_of_work = UnitOfWork::new(Arc::new(ScriptedDatabase::logging_to(log.clone())));
        let dispatcher = Dispatcher::builder()
            .register::<Touch, _>(Shared(handler))
            .unwrap()
            .command_middleware(TimeoutMiddleware::new(Duration::from_millis(20)))
            .command_middleware(TransactionMiddleware::new(unit_of_work))
            .build();

        // Act
        let result = dispatcher.dispatch(Touch::default()).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Timeout(_))));
        assert_eq!(log.entries(), vec!["begin", "handler(tx)"]);
    }
}
