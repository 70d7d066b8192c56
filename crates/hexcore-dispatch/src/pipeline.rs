//! Middleware chain plumbing.

use std::any::{Any, type_name};
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use hexcore_core::error::DomainError;
use hexcore_core::request::{Handler, Message, Request, RequestKind};
use hexcore_core::transaction::{Database, RequestContext};

/// Type-erased handler result travelling back up the chain.
pub type Response = Box<dyn Any + Send + Sync>;

/// Cross-cutting behaviour wrapped around a handler.
///
/// Implementations call [`Next::run`] zero or more times. Middleware
/// registered first runs outermost.
#[async_trait]
pub trait Middleware<D: Database>: Send + Sync + 'static {
    /// Name shown in logs and by [`crate::Dispatcher::middleware_names`].
    fn name(&self) -> &'static str;

    /// Handles the request, usually by delegating to `next`.
    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        next: Next<'_, D>,
    ) -> Result<Response, DomainError>;
}

/// Type-erased terminal handler.
#[async_trait]
pub(crate) trait Endpoint<D: Database>: Send + Sync {
    async fn call(
        &self,
        ctx: &mut RequestContext<D>,
        request: &(dyn Any + Send + Sync),
    ) -> Result<Response, DomainError>;

    fn requires_transaction(&self) -> bool;

    fn encode(&self, response: &Response) -> Result<String, DomainError>;

    fn decode(&self, raw: &str) -> Result<Response, DomainError>;
}

pub(crate) struct TypedEndpoint<R, H> {
    handler: H,
    _request: PhantomData<fn(R)>,
}

impl<R, H> TypedEndpoint<R, H> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            _request: PhantomData,
        }
    }
}

#[async_trait]
impl<R, D, H> Endpoint<D> for TypedEndpoint<R, H>
where
    R: Request,
    D: Database,
    H: Handler<R, D>,
{
    async fn call(
        &self,
        ctx: &mut RequestContext<D>,
        request: &(dyn Any + Send + Sync),
    ) -> Result<Response, DomainError> {
        let request = request
            .downcast_ref::<R>()
            .ok_or(DomainError::HandlerNotFound(type_name::<R>()))?;
        let output = self.handler.handle(ctx, request).await?;
        Ok(Box::new(output))
    }

    fn requires_transaction(&self) -> bool {
        self.handler.requires_transaction()
    }

    fn encode(&self, response: &Response) -> Result<String, DomainError> {
        let output = response.downcast_ref::<R::Output>().ok_or_else(|| {
            DomainError::Infrastructure(format!("unexpected response type for {}", type_name::<R>()))
        })?;
        serde_json::to_string(output)
            .map_err(|e| DomainError::Infrastructure(format!("response encoding failed: {e}")))
    }

    fn decode(&self, raw: &str) -> Result<Response, DomainError> {
        let output: R::Output = serde_json::from_str(raw)
            .map_err(|e| DomainError::Infrastructure(format!("response decoding failed: {e}")))?;
        Ok(Box::new(output))
    }
}

/// The remainder of the chain, ending in the handler.
pub struct Next<'a, D: Database> {
    pub(crate) message: &'a dyn Message,
    pub(crate) request: &'a (dyn Any + Send + Sync),
    pub(crate) kind: RequestKind,
    pub(crate) endpoint: &'a dyn Endpoint<D>,
    pub(crate) chain: &'a [Arc<dyn Middleware<D>>],
}

impl<D: Database> Clone for Next<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: Database> Copy for Next<'_, D> {}

impl<'a, D: Database> Next<'a, D> {
    /// The request being dispatched.
    #[must_use]
    pub fn message(&self) -> &'a dyn Message {
        self.message
    }

    /// Command or query.
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Whether the handler asked for a transaction.
    #[must_use]
    pub fn requires_transaction(&self) -> bool {
        self.endpoint.requires_transaction()
    }

    /// Encodes a response of this request type as JSON.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` if the response cannot be encoded.
    pub fn encode(&self, response: &Response) -> Result<String, DomainError> {
        self.endpoint.encode(response)
    }

    /// Decodes a JSON response of this request type.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` if `raw` is not a valid response.
    pub fn decode(&self, raw: &str) -> Result<Response, DomainError> {
        self.endpoint.decode(raw)
    }

    /// Runs the rest of the chain.
    ///
    /// # Errors
    ///
    /// Returns whatever the remaining middleware or the handler returns.
    pub async fn run(self, ctx: &mut RequestContext<D>) -> Result<Response, DomainError> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    chain: rest,
                    ..self
                };
                head.handle(ctx, next).await
            }
            None => self.endpoint.call(ctx, self.request).await,
        }
    }
}
