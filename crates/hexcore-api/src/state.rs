//! Shared application state.

use std::sync::Arc;

use hexcore_core::transaction::Database;
use hexcore_dispatch::Dispatcher;

/// Application state shared across all request handlers.
pub struct AppState<D: Database> {
    /// Routes every command and query.
    pub dispatcher: Arc<Dispatcher<D>>,
}

impl<D: Database> AppState<D> {
    /// Create new application state.
    #[must_use]
    pub fn new(dispatcher: Dispatcher<D>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

impl<D: Database> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}
