//! Transaction boundary.

use async_trait::async_trait;
use hexcore_core::error::DomainError;
use hexcore_core::transaction::{Database, RequestContext};
use hexcore_core::unit_of_work::{UnitOfWork, catch_fault};

use crate::pipeline::{Middleware, Next, Response};

/// Runs handlers that require a transaction inside a unit of work.
///
/// Commits on success, rolls back on error or panic. A request dispatched
/// inside an existing transaction joins it.
pub struct TransactionMiddleware<D: Database> {
    unit_of_work: UnitOfWork<D>,
}

impl<D: Database> TransactionMiddleware<D> {
    /// Opens transactions through `unit_of_work`.
    #[must_use]
    pub fn new(unit_of_work: UnitOfWork<D>) -> Self {
        Self { unit_of_work }
    }
}

impl<D: Database> std::fmt::Debug for TransactionMiddleware<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionMiddleware").finish_non_exhaustive()
    }
}

#[async_trait]
impl<D: Database> Middleware<D> for TransactionMiddleware<D> {
    fn name(&self) -> &'static str {
        "transaction"
    }

    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        next: Next<'_, D>,
    ) -> Result<Response, DomainError> {
        if !next.requires_transaction() {
            return next.run(ctx).await;
        }
        let mut scope = self.unit_of_work.begin(ctx).await?;
        let outcome = catch_fault(next.run(scope.context())).await;
        scope.finish(outcome).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hexcore_test_support::{CallLog, ScriptedDatabase};

    use super::*;
    use crate::Dispatcher;
    use crate::testing::{ScriptedHandler, Shared, Touch};

    fn dispatcher(
        database: ScriptedDatabase,
        handler: Arc<ScriptedHandler>,
    ) -> Dispatcher<ScriptedDatabase> {
        let unit_of_work = UnitOfWork::new(Arc::new(database));
        Dispatcher::builder()
            .register::<Touch, _>(Shared(handler))
            .unwrap()
            .command_middleware(TransactionMiddleware::new(unit_of_work))
            .build()
    }

    #[tokio::test]
    async fn test_transactional_handler_commits_on_success() {
        // Arrange
        let log = CallLog::default();
        let handler = Arc::new(ScriptedHandler {
            transactional: true,
            log: log.clone(),
            ..ScriptedHandler::default()
        });
        let dispatcher = dispatcher(ScriptedDatabase::logging_to(log.clone()), handler);

        // Act
        let result = dispatcher.dispatch(Touch::default()).await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(log.entries(), vec!["begin", "handler(tx)", "commit"]);
    }

    #[tokio::test]
    async fn test_transactional_handler_rolls_back_on_error() {
        let log = CallLog::default();
        let handler = Arc::new(ScriptedHandler {
            transactional: true,
            log: log.clone(),
            ..ScriptedHandler::failing_with(vec![DomainError::InvariantViolation("no".into())])
        });
        let dispatcher = dispatcher(ScriptedDatabase::logging_to(log.clone()), handler);

        let result = dispatcher.dispatch(Touch::default()).await;

        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
        assert_eq!(log.entries(), vec!["begin", "handler(tx)", "rollback"]);
    }

    #[tokio::test]
    async fn test_non_transactional_handler_runs_without_transaction() {
        let log = CallLog::default();
        let handler = Arc::new(ScriptedHandler {
            log: log.clone(),
            ..ScriptedHandler::default()
        });
        let dispatcher = dispatcher(ScriptedDatabase::logging_to(log.clone()), handler);

        dispatcher.dispatch(Touch::default()).await.unwrap();

        assert_eq!(log.entries(), vec!["handler"]);
    }

    #[tokio::test]
    async fn test_begin_failure_skips_handler() {
        let log = CallLog::default();
        let handler = Arc::new(ScriptedHandler {
            transactional: true,
            log: log.clone(),
            ..ScriptedHandler::default()
        });
        let database = ScriptedDatabase {
            fail_begin: true,
            ..ScriptedDatabase::logging_to(log.clone())
        };
        let dispatcher = dispatcher(database, handler.clone());

        let result = dispatcher.dispatch(Touch::default()).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert_eq!(handler.calls(), 0);
        assert_eq!(log.entries(), vec!["begin"]);
    }
}
