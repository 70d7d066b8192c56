//! Request validation.

use async_trait::async_trait;
use hexcore_core::error::DomainError;
use hexcore_core::transaction::{Database, RequestContext};
use tracing::debug;

use crate::pipeline::{Middleware, Next, Response};

/// Rejects requests whose `validate` fails, before the handler runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationMiddleware;

#[async_trait]
impl<D: Database> Middleware<D> for ValidationMiddleware {
    fn name(&self) -> &'static str {
        "validation"
    }

    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        next: Next<'_, D>,
    ) -> Result<Response, DomainError> {
        if let Err(err) = next.message().validate() {
            debug!(
                correlation_id = %ctx.correlation_id(),
                message_type = next.message().message_type(),
                error = %err,
                "request rejected by validation"
            );
            return Err(err);
        }
        next.run(ctx).await
    }
}
