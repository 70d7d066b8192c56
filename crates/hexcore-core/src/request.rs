//! Commands, queries and their handlers.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::cache::CachePolicy;
use crate::error::DomainError;
use crate::transaction::{Database, RequestContext};

/// Whether a request changes state or only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Changes state.
    Command,
    /// Reads state.
    Query,
}

impl RequestKind {
    /// Lower-case name used in logs and metric names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Query => "query",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object-safe view of a request that middleware inspects.
pub trait Message: Send + Sync + fmt::Debug + 'static {
    /// Short type name, e.g. `RegisterUser`.
    fn message_type(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Correlation id supplied by the caller, if any.
    fn correlation_id(&self) -> Option<Uuid> {
        None
    }

    /// Checks the request before it reaches its handler.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` describing the first problem found.
    fn validate(&self) -> Result<(), DomainError> {
        Ok(())
    }

    /// Cache key and lifetime for the result of a query.
    fn cache_policy(&self) -> Option<CachePolicy> {
        None
    }

    /// Cache keys a successful command makes stale.
    fn invalidates(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A typed request routed by the dispatcher.
pub trait Request: Message {
    /// Result type.
    type Output: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Command or query.
    const KIND: RequestKind;
}

/// Handles one request type.
#[async_trait]
pub trait Handler<R: Request, D: Database>: Send + Sync + 'static {
    /// Handles `request` within `ctx`.
    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        request: &R,
    ) -> Result<R::Output, DomainError>;

    /// Whether the pipeline must open a transaction around this handler.
    fn requires_transaction(&self) -> bool {
        false
    }
}
