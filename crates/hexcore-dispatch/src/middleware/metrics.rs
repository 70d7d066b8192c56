//! Request counters and timings.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use hexcore_core::error::DomainError;
use hexcore_core::metrics::Metrics;
use hexcore_core::request::RequestKind;
use hexcore_core::transaction::{Database, RequestContext};

use crate::pipeline::{Middleware, Next, Response};

/// Emits `<kind>_success`, `<kind>_failure` and `<kind>_duration`, labelled
/// with the message type and, on failure, the error code.
pub struct MetricsMiddleware {
    metrics: Arc<dyn Metrics>,
}

impl MetricsMiddleware {
    /// Reports to `metrics`.
    #[must_use]
    pub fn new(metrics: Arc<dyn Metrics>) -> Self {
        Self { metrics }
    }
}

impl std::fmt::Debug for MetricsMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsMiddleware").finish_non_exhaustive()
    }
}

#[async_trait]
impl<D: Database> Middleware<D> for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn handle(
        &self,
        ctx: &mut RequestContext<D>,
        next: Next<'_, D>,
    ) -> Result<Response, DomainError> {
        let (success, failure, duration) = match next.kind() {
            RequestKind::Command => ("command_success", "command_failure", "command_duration"),
            RequestKind::Query => ("query_success", "query_failure", "query_duration"),
        };
        let message_type = next.message().message_type();

        let started = Instant::now();
        let result = next.run(ctx).await;
        let elapsed = started.elapsed().as_secs_f64();

        let mut labels = vec![("message_type", message_type.to_owned())];
        self.metrics.record_duration(duration, elapsed, &labels);
        match &result {
            Ok(_) => self.metrics.increment_counter(success, &labels),
            Err(err) => {
                labels.push(("error", err.code().to_owned()));
                self.metrics.increment_counter(failure, &labels);
            }
        }
        result
    }
}
