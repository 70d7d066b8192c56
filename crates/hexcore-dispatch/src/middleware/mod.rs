//! Standard middleware.

mod caching;
mod invalidation;
mod logging;
mod metrics;
mod retry;
mod timeout;
mod transaction;
mod validation;

pub use caching::CachingMiddleware;
pub use invalidation::CacheInvalidationMiddleware;
pub use logging::LoggingMiddleware;
pub use metrics::MetricsMiddleware;
pub use retry::{RetryMiddleware, RetryPolicy, RetryPolicyBuilder};
pub use timeout::TimeoutMiddleware;
pub use transaction::TransactionMiddleware;
pub use validation::ValidationMiddleware;
