//! Transaction state machine and the per-request context that carries it.

use std::fmt;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::StoredEvent;

/// A transactional backend.
///
/// Dropping a handle without committing it must discard its writes.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    /// Live backend transaction.
    type Handle: Send + 'static;

    /// Opens a backend transaction.
    async fn begin(&self) -> Result<Self::Handle, DomainError>;

    /// Makes the handle's writes durable.
    async fn commit(&self, handle: Self::Handle) -> Result<(), DomainError>;

    /// Discards the handle's writes.
    async fn rollback(&self, handle: Self::Handle) -> Result<(), DomainError>;
}

/// Lifecycle state of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Not yet begun.
    Idle,
    /// Begun and accepting writes.
    Active,
    /// Committed. Terminal.
    Committed,
    /// Rolled back, or failed to commit. Terminal.
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        };
        f.write_str(name)
    }
}

/// One backend transaction with exactly one terminal outcome.
pub struct Transaction<D: Database> {
    state: TransactionState,
    handle: Option<D::Handle>,
}

impl<D: Database> Transaction<D> {
    /// Creates an idle transaction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: TransactionState::Idle,
            handle: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Idle → Active.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransactionState` unless idle, or the backend error.
    pub async fn begin(&mut self, database: &D) -> Result<(), DomainError> {
        self.expect_state(TransactionState::Idle, "begin")?;
        self.handle = Some(database.begin().await?);
        self.state = TransactionState::Active;
        Ok(())
    }

    /// Active → Committed. A failed commit leaves the transaction rolled back.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransactionState` unless active, or the backend error.
    pub async fn commit(&mut self, database: &D) -> Result<(), DomainError> {
        let handle = self.take_active("commit")?;
        match database.commit(handle).await {
            Ok(()) => {
                self.state = TransactionState::Committed;
                Ok(())
            }
            Err(e) => {
                self.state = TransactionState::RolledBack;
                Err(e)
            }
        }
    }

    /// Active → `RolledBack`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransactionState` unless active, or the backend error.
    pub async fn rollback(&mut self, database: &D) -> Result<(), DomainError> {
        let handle = self.take_active("rollback")?;
        self.state = TransactionState::RolledBack;
        database.rollback(handle).await
    }

    /// Borrows the live backend handle.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransactionState` unless active.
    pub fn handle(&mut self) -> Result<&mut D::Handle, DomainError> {
        let state = self.state;
        match (state, self.handle.as_mut()) {
            (TransactionState::Active, Some(handle)) => Ok(handle),
            _ => Err(DomainError::InvalidTransactionState {
                state,
                operation: "write through",
            }),
        }
    }

    fn expect_state(
        &self,
        expected: TransactionState,
        operation: &'static str,
    ) -> Result<(), DomainError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DomainError::InvalidTransactionState {
                state: self.state,
                operation,
            })
        }
    }

    fn take_active(&mut self, operation: &'static str) -> Result<D::Handle, DomainError> {
        self.expect_state(TransactionState::Active, operation)?;
        self.handle
            .take()
            .ok_or(DomainError::InvalidTransactionState {
                state: self.state,
                operation,
            })
    }
}

impl<D: Database> Default for Transaction<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Database> fmt::Debug for Transaction<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Per-request context threaded through middleware and handlers.
///
/// Holds the active transaction, if any, and the events written through it
/// that await publication. Never shared between requests.
pub struct RequestContext<D: Database> {
    correlation_id: Uuid,
    transaction: Option<Transaction<D>>,
    unpublished: Vec<StoredEvent>,
}

impl<D: Database> RequestContext<D> {
    /// Creates a context with a fresh correlation id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_correlation_id(Uuid::new_v4())
    }

    /// Creates a context with the given correlation id.
    #[must_use]
    pub fn with_correlation_id(correlation_id: Uuid) -> Self {
        Self {
            correlation_id,
            transaction: None,
            unpublished: Vec::new(),
        }
    }

    /// Correlation id shared by everything this request does.
    #[must_use]
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Whether an active transaction is attached.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction
            .as_ref()
            .is_some_and(|tx| tx.state() == TransactionState::Active)
    }

    /// Borrows the handle of the attached transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransactionState` when no active transaction is attached.
    pub fn transaction(&mut self) -> Result<&mut D::Handle, DomainError> {
        match self.transaction.as_mut() {
            Some(tx) => tx.handle(),
            None => Err(DomainError::InvalidTransactionState {
                state: TransactionState::Idle,
                operation: "write through",
            }),
        }
    }

    /// Events appended through the attached transaction, in append order.
    #[must_use]
    pub fn unpublished_events(&self) -> &[StoredEvent] {
        &self.unpublished
    }

    /// Queues appended events for publication when the transaction commits.
    pub(crate) fn queue_for_publication(&mut self, events: Vec<StoredEvent>) {
        self.unpublished.extend(events);
    }

    pub(crate) fn take_unpublished(&mut self) -> Vec<StoredEvent> {
        std::mem::take(&mut self.unpublished)
    }

    pub(crate) fn attach(&mut self, transaction: Transaction<D>) {
        self.unpublished.clear();
        self.transaction = Some(transaction);
    }

    pub(crate) fn detach(&mut self) -> Option<Transaction<D>> {
        self.transaction.take()
    }
}

impl<D: Database> Default for RequestContext<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Database> fmt::Debug for RequestContext<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("correlation_id", &self.correlation_id)
            .field("transaction", &self.transaction)
            .field("unpublished", &self.unpublished.len())
            .finish()
    }
}
