//! Unit of work.
//!
//! Demarcates one atomic transaction over a [`Database`]. The transaction is
//! attached to the caller's [`RequestContext`], so repositories and the
//! event store write through it without any shared state. A unit of work
//! started while the context already holds an active transaction joins it
//! instead of opening a second one; only the outermost scope commits or
//! rolls back.
//!
//! Events appended through the transaction are handed to the configured
//! [`EventPublisher`] after the outermost scope commits. A rolled-back or
//! abandoned transaction publishes nothing.

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, resume_unwind};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::StoredEvent;
use crate::metrics::{Metrics, NoopMetrics};
use crate::publisher::EventPublisher;
use crate::transaction::{Database, RequestContext, Transaction, TransactionState};

/// Panic payload captured from transactional work.
pub type Fault = Box<dyn Any + Send>;

/// Runs `future`, turning a panic into an `Err(Fault)`.
///
/// Pass the result to [`TransactionScope::finish`], which rolls back before
/// resuming the panic.
pub async fn catch_fault<F, T>(future: F) -> Result<Result<T, DomainError>, Fault>
where
    F: Future<Output = Result<T, DomainError>>,
{
    AssertUnwindSafe(future).catch_unwind().await
}

/// Opens, commits and rolls back transactions on a [`Database`].
pub struct UnitOfWork<D: Database> {
    database: Arc<D>,
    metrics: Arc<dyn Metrics>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl<D: Database> UnitOfWork<D> {
    /// Creates a unit of work that reports no metrics.
    #[must_use]
    pub fn new(database: Arc<D>) -> Self {
        Self {
            database,
            metrics: Arc::new(NoopMetrics),
            publisher: None,
        }
    }

    /// Reports begin/commit/rollback counters and timings to `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Publishes committed events to `publisher`.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Whether committed events are published.
    #[must_use]
    pub fn publishes_events(&self) -> bool {
        self.publisher.is_some()
    }

    /// The backend this unit of work drives.
    #[must_use]
    pub fn database(&self) -> &Arc<D> {
        &self.database
    }

    /// Starts a scope on `ctx`.
    ///
    /// If `ctx` already holds an active transaction the scope joins it and
    /// its `finish` neither commits nor rolls back.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the transaction cannot be opened.
    pub async fn begin<'c>(
        &self,
        ctx: &'c mut RequestContext<D>,
    ) -> Result<TransactionScope<'c, D>, DomainError> {
        if ctx.in_transaction() {
            debug!(correlation_id = %ctx.correlation_id(), "joining active transaction");
            return Ok(self.scope(ctx, false));
        }

        let started = Instant::now();
        let mut transaction = Transaction::<D>::new();
        let result = transaction.begin(self.database.as_ref()).await;
        self.observe("uow_begin", started, result.is_ok());
        result?;

        debug!(correlation_id = %ctx.correlation_id(), "transaction started");
        ctx.attach(transaction);
        Ok(self.scope(ctx, true))
    }

    /// Runs `work` inside a transaction on `ctx`.
    ///
    /// Commits when `work` returns `Ok`. Rolls back and returns the original
    /// error when it returns `Err`, or `RollbackFailed` if the rollback also
    /// fails. Rolls back and resumes the panic when it panics.
    ///
    /// ```ignore
    /// uow.with_transaction(&mut ctx, |ctx| {
    ///     Box::pin(async move { repository.save(ctx, &mut user).await })
    /// })
    /// .await?;
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the error from `work`, begin, commit or rollback.
    pub async fn with_transaction<T, F>(
        &self,
        ctx: &mut RequestContext<D>,
        work: F,
    ) -> Result<T, DomainError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut RequestContext<D>) -> BoxFuture<'c, Result<T, DomainError>>
            + Send,
    {
        let mut scope = self.begin(ctx).await?;
        let outcome = catch_fault(work(scope.context())).await;
        scope.finish(outcome).await
    }

    fn scope<'c>(&self, ctx: &'c mut RequestContext<D>, owner: bool) -> TransactionScope<'c, D> {
        TransactionScope {
            ctx,
            owner,
            finished: false,
            database: Arc::clone(&self.database),
            metrics: Arc::clone(&self.metrics),
            publisher: self.publisher.clone(),
        }
    }

    fn observe(&self, operation: &'static str, started: Instant, ok: bool) {
        observe(self.metrics.as_ref(), operation, started, ok);
    }
}

impl<D: Database> Clone for UnitOfWork<D> {
    fn clone(&self) -> Self {
        Self {
            database: Arc::clone(&self.database),
            metrics: Arc::clone(&self.metrics),
            publisher: self.publisher.clone(),
        }
    }
}

impl<D: Database> std::fmt::Debug for UnitOfWork<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("publishes_events", &self.publishes_events())
            .finish_non_exhaustive()
    }
}

/// A transaction attached to a request context for the duration of some work.
///
/// Must be closed with [`finish`](Self::finish). A scope dropped before that
/// (e.g. its future was cancelled by a timeout) detaches the transaction and
/// drops the backend handle, which discards every write made through it.
#[must_use = "a transaction scope must be finished"]
pub struct TransactionScope<'c, D: Database> {
    ctx: &'c mut RequestContext<D>,
    owner: bool,
    finished: bool,
    database: Arc<D>,
    metrics: Arc<dyn Metrics>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl<D: Database> TransactionScope<'_, D> {
    /// The context the work should run against.
    pub fn context(&mut self) -> &mut RequestContext<D> {
        self.ctx
    }

    /// Whether this scope opened the transaction.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Closes the scope according to the outcome of the work.
    ///
    /// # Errors
    ///
    /// Returns the work's error, the commit error, or `RollbackFailed`.
    ///
    /// # Panics
    ///
    /// Resumes the captured panic after rolling back.
    pub async fn finish<T>(
        mut self,
        outcome: Result<Result<T, DomainError>, Fault>,
    ) -> Result<T, DomainError> {
        self.finished = true;
        if !self.owner {
            return outcome.unwrap_or_else(|fault| resume_unwind(fault));
        }

        let Some(mut transaction) = self.ctx.detach() else {
            return Err(DomainError::InvalidTransactionState {
                state: TransactionState::Idle,
                operation: "finish",
            });
        };
        let unpublished = self.ctx.take_unpublished();
        let correlation_id = self.ctx.correlation_id();
        let database = Arc::clone(&self.database);
        let metrics = Arc::clone(&self.metrics);

        match outcome {
            Ok(Ok(value)) => {
                let started = Instant::now();
                let result = transaction.commit(database.as_ref()).await;
                observe(metrics.as_ref(), "uow_commit", started, result.is_ok());
                result?;
                debug!(%correlation_id, "transaction committed");
                if let Some(publisher) = self.publisher.clone() {
                    publish(publisher.as_ref(), &unpublished, correlation_id).await;
                }
                Ok(value)
            }
            Ok(Err(original)) => {
                match roll_back(database.as_ref(), metrics.as_ref(), &mut transaction).await {
                    Ok(()) => {
                        debug!(%correlation_id, error = %original, "transaction rolled back");
                        Err(original)
                    }
                    Err(rollback) => {
                        error!(%correlation_id, error = %original, %rollback, "rollback failed");
                        Err(DomainError::RollbackFailed {
                            original: Box::new(original),
                            rollback: Box::new(rollback),
                        })
                    }
                }
            }
            Err(fault) => {
                if let Err(rollback) =
                    roll_back(database.as_ref(), metrics.as_ref(), &mut transaction).await
                {
                    error!(%correlation_id, %rollback, "rollback after panic failed");
                } else {
                    warn!(%correlation_id, "transaction rolled back after panic");
                }
                resume_unwind(fault)
            }
        }
    }
}

impl<D: Database> Drop for TransactionScope<'_, D> {
    fn drop(&mut self) {
        if self.owner && !self.finished && self.ctx.detach().is_some() {
            self.ctx.take_unpublished();
            self.metrics.increment_counter("uow_rollback_success", &[]);
            warn!(
                correlation_id = %self.ctx.correlation_id(),
                "transaction abandoned before completion; writes discarded"
            );
        }
    }
}

async fn roll_back<D: Database>(
    database: &D,
    metrics: &dyn Metrics,
    transaction: &mut Transaction<D>,
) -> Result<(), DomainError> {
    let started = Instant::now();
    let result = transaction.rollback(database).await;
    observe(metrics, "uow_rollback", started, result.is_ok());
    result
}

// The events are durable by now, so a failed delivery is logged, never returned.
async fn publish(publisher: &dyn EventPublisher, events: &[StoredEvent], correlation_id: Uuid) {
    if events.is_empty() {
        return;
    }
    match publisher.publish(events).await {
        Ok(()) => debug!(%correlation_id, count = events.len(), "events published"),
        Err(error) => warn!(%correlation_id, %error, "event publication failed"),
    }
}

fn observe(metrics: &dyn Metrics, operation: &'static str, started: Instant, ok: bool) {
    let (counter, duration) = match (operation, ok) {
        ("uow_begin", true) => ("uow_begin_success", "uow_begin_duration"),
        ("uow_begin", false) => ("uow_begin_error", "uow_begin_duration"),
        ("uow_commit", true) => ("uow_commit_success", "uow_commit_duration"),
        ("uow_commit", false) => ("uow_commit_error", "uow_commit_duration"),
        (_, true) => ("uow_rollback_success", "uow_rollback_duration"),
        (_, false) => ("uow_rollback_error", "uow_rollback_duration"),
    };
    metrics.increment_counter(counter, &[]);
    metrics.record_duration(duration, started.elapsed().as_secs_f64(), &[]);
}
