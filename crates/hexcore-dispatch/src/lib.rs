//! Hexcore Dispatch — command/query dispatcher and middleware pipeline.
//!
//! A [`Dispatcher`] routes each request to exactly one registered handler,
//! through the middleware chain configured for its kind. The standard
//! middleware (validation, transaction, caching, retry, timeout, logging,
//! metrics) is assembled from a [`PipelineConfig`].

pub mod config;
pub mod dispatcher;
pub mod middleware;
pub mod pipeline;

#[cfg(test)]
mod testing;

pub use config::{PipelineConfig, PipelineServices};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use pipeline::{Middleware, Next, Response};
