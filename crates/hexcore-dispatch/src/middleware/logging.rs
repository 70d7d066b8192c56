//! Structured request logging.

use std::time::Instant;

use async_trait::async_trait;
use hexcore_core::error::DomainError;
use hexcore_core::transaction::{Database, RequestContext};
use tracing::{debug, info, warn};

use crate::pipeline::{Middleware, Next, Response};

/// Logs every request with its outcome and elapsed time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

#[async_trait]
impl<D: Database> Middleware<D> for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        next: Next<'_, D>,
    ) -> Result<Response, DomainError> {
        let message = next.message();
        let correlation_id = ctx.correlation_id();
        let message_type = message.message_type();
        let kind = next.kind();
        debug!(%correlation_id, %kind, message_type, request = ?message, "dispatching request");

        let started = Instant::now();
        let result = next.run(ctx).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(_) => info!(%correlation_id, %kind, message_type, elapsed_ms, "request handled"),
            Err(err) => warn!(
                %correlation_id,
                %kind,
                message_type,
                elapsed_ms,
                code = err.code(),
                error = %err,
                "request failed"
            ),
        }
        result
    }
}
