//! Request routing.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use hexcore_core::error::DomainError;
use hexcore_core::request::{Handler, Request, RequestKind};
use hexcore_core::transaction::{Database, RequestContext};
use tracing::debug;

use crate::config::{PipelineConfig, PipelineServices};
use crate::pipeline::{Endpoint, Middleware, Next, TypedEndpoint};

/// Collects handlers and middleware, then freezes them into a [`Dispatcher`].
pub struct DispatcherBuilder<D: Database> {
    routes: HashMap<TypeId, Arc<dyn Endpoint<D>>>,
    command_middleware: Vec<Arc<dyn Middleware<D>>>,
    query_middleware: Vec<Arc<dyn Middleware<D>>>,
}

impl<D: Database> DispatcherBuilder<D> {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            command_middleware: Vec::new(),
            query_middleware: Vec::new(),
        }
    }

    /// Routes requests of type `R` to `handler`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateHandler` if `R` already has a handler.
    pub fn register<R, H>(mut self, handler: H) -> Result<Self, DomainError>
    where
        R: Request,
        H: Handler<R, D>,
    {
        match self.routes.entry(TypeId::of::<R>()) {
            Entry::Occupied(_) => Err(DomainError::DuplicateHandler(type_name::<R>())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(TypedEndpoint::<R, H>::new(handler)));
                debug!(request = type_name::<R>(), kind = %R::KIND, "handler registered");
                Ok(self)
            }
        }
    }

    /// Appends middleware to the command chain. First added runs outermost.
    #[must_use]
    pub fn command_middleware(mut self, middleware: impl Middleware<D>) -> Self {
        self.command_middleware.push(Arc::new(middleware));
        self
    }

    /// Appends middleware to the query chain. First added runs outermost.
    #[must_use]
    pub fn query_middleware(mut self, middleware: impl Middleware<D>) -> Self {
        self.query_middleware.push(Arc::new(middleware));
        self
    }

    /// Appends the standard command and query chains described by `config`.
    #[must_use]
    pub fn with_pipeline(mut self, config: &PipelineConfig, services: &PipelineServices<D>) -> Self {
        self.command_middleware
            .extend(config.command.build(services));
        self.query_middleware.extend(config.query.build(services));
        self
    }

    /// Freezes the routing table.
    #[must_use]
    pub fn build(self) -> Dispatcher<D> {
        Dispatcher {
            routes: self.routes,
            command_middleware: self.command_middleware,
            query_middleware: self.query_middleware,
        }
    }
}

impl<D: Database> Default for DispatcherBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes each request to its single handler through the chain for its kind.
///
/// Immutable once built, so it can be shared freely between tasks.
pub struct Dispatcher<D: Database> {
    routes: HashMap<TypeId, Arc<dyn Endpoint<D>>>,
    command_middleware: Vec<Arc<dyn Middleware<D>>>,
    query_middleware: Vec<Arc<dyn Middleware<D>>>,
}

impl<D: Database> Dispatcher<D> {
    /// Starts building a dispatcher.
    #[must_use]
    pub fn builder() -> DispatcherBuilder<D> {
        DispatcherBuilder::new()
    }

    /// Dispatches `request` in a fresh request context.
    ///
    /// # Errors
    ///
    /// Returns `HandlerNotFound` for an unregistered request type, otherwise
    /// whatever the chain returns.
    pub async fn dispatch<R: Request>(&self, request: R) -> Result<R::Output, DomainError> {
        let mut ctx = match request.correlation_id() {
            Some(correlation_id) => RequestContext::with_correlation_id(correlation_id),
            None => RequestContext::new(),
        };
        self.dispatch_in(&mut ctx, &request).await
    }

    /// Dispatches `request` inside an existing context.
    ///
    /// A request dispatched while `ctx` holds a transaction runs inside it.
    ///
    /// # Errors
    ///
    /// Returns `HandlerNotFound` for an unregistered request type, otherwise
    /// whatever the chain returns.
    pub async fn dispatch_in<R: Request>(
        &self,
        ctx: &mut RequestContext<D>,
        request: &R,
    ) -> Result<R::Output, DomainError> {
        let endpoint = self
            .routes
            .get(&TypeId::of::<R>())
            .ok_or(DomainError::HandlerNotFound(type_name::<R>()))?;
        let next = Next {
            message: request,
            request,
            kind: R::KIND,
            endpoint: endpoint.as_ref(),
            chain: self.chain(R::KIND),
        };
        let response = next.run(ctx).await?;
        response
            .downcast::<R::Output>()
            .map(|output| *output)
            .map_err(|_| {
                DomainError::Infrastructure(format!(
                    "handler for {} returned an unexpected type",
                    type_name::<R>()
                ))
            })
    }

    /// Whether a handler is registered for `R`.
    #[must_use]
    pub fn handles<R: Request>(&self) -> bool {
        self.routes.contains_key(&TypeId::of::<R>())
    }

    /// Names of the middleware in the chain for `kind`, outermost first.
    #[must_use]
    pub fn middleware_names(&self, kind: RequestKind) -> Vec<&'static str> {
        self.chain(kind).iter().map(|m| m.name()).collect()
    }

    fn chain(&self, kind: RequestKind) -> &[Arc<dyn Middleware<D>>] {
        match kind {
            RequestKind::Command => &self.command_middleware,
            RequestKind::Query => &self.query_middleware,
        }
    }
}

impl<D: Database> std::fmt::Debug for Dispatcher<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes.len())
            .field("command_middleware", &self.middleware_names(RequestKind::Command))
            .field("query_middleware", &self.middleware_names(RequestKind::Query))
            .finish()
    }
}
