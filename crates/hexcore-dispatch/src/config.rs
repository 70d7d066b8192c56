//! Pipeline configuration.
//!
//! Loaded from YAML; every field has a default so a partial file, or none
//! at all, yields a working pipeline.
//!
//! ```yaml
//! command:
//!   timeout_ms: 5000
//!   event_publishing: false
//! query:
//!   cache:
//!     default_ttl_secs: 60
//!   retry:
//!     max_retries: 2
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hexcore_core::cache::Cache;
use hexcore_core::metrics::{Metrics, NoopMetrics};
use hexcore_core::publisher::EventPublisher;
use hexcore_core::transaction::Database;
use hexcore_core::unit_of_work::UnitOfWork;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::middleware::{
    CacheInvalidationMiddleware, CachingMiddleware, LoggingMiddleware, MetricsMiddleware,
    RetryMiddleware, RetryPolicy, TimeoutMiddleware, TransactionMiddleware, ValidationMiddleware,
};
use crate::pipeline::Middleware;

/// Errors raised while loading a pipeline configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read pipeline config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid YAML for this schema.
    #[error("invalid pipeline config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Standard middleware for both chains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Command chain.
    pub command: CommandPipelineConfig,
    /// Query chain.
    pub query: QueryPipelineConfig,
}

impl PipelineConfig {
    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads and parses a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, or
    /// `ConfigError::Parse` for malformed YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }
}

/// Command chain: logging, metrics, cache invalidation, validation,
/// timeout, transaction. Outermost first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandPipelineConfig {
    /// Log every command.
    pub logging: bool,
    /// Count and time every command.
    pub metrics: bool,
    /// Drop stale cache keys after a successful command.
    pub cache_invalidation: bool,
    /// Reject invalid commands before they reach their handler.
    pub validation: bool,
    /// Deadline per command. `None` disables the timeout.
    pub timeout_ms: Option<u64>,
    /// Open a transaction for handlers that ask for one.
    pub transaction: bool,
    /// Publish events once their transaction commits.
    pub event_publishing: bool,
}

impl Default for CommandPipelineConfig {
    fn default() -> Self {
        Self {
            logging: true,
            metrics: true,
            cache_invalidation: true,
            validation: true,
            timeout_ms: Some(30_000),
            transaction: true,
            event_publishing: true,
        }
    }
}

impl CommandPipelineConfig {
    pub(crate) fn build<D: Database>(&self, services: &PipelineServices<D>) -> Vec<Arc<dyn Middleware<D>>> {
        let mut chain: Vec<Arc<dyn Middleware<D>>> = Vec::new();
        if self.logging {
            chain.push(Arc::new(LoggingMiddleware));
        }
        if self.metrics {
            chain.push(Arc::new(MetricsMiddleware::new(Arc::clone(&services.metrics))));
        }
        if self.cache_invalidation {
            if let Some(cache) = &services.cache {
                chain.push(Arc::new(CacheInvalidationMiddleware::new(Arc::clone(cache))));
            }
        }
        if self.validation {
            chain.push(Arc::new(ValidationMiddleware));
        }
        if let Some(ms) = self.timeout_ms {
            chain.push(Arc::new(TimeoutMiddleware::new(Duration::from_millis(ms))));
        }
        if self.transaction {
            chain.push(Arc::new(TransactionMiddleware::new(
                services.command_unit_of_work(self),
            )));
        }
        chain
    }
}

/// Query chain: logging, metrics, validation, timeout, caching, retry.
/// Outermost first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryPipelineConfig {
    /// Log every query.
    pub logging: bool,
    /// Count and time every query.
    pub metrics: bool,
    /// Reject invalid queries before they reach their handler.
    pub validation: bool,
    /// Deadline per query, retries included. `None` disables the timeout.
    pub timeout_ms: Option<u64>,
    /// Result caching.
    pub cache: CacheConfig,
    /// Retry of transient failures.
    pub retry: RetryConfig,
}

impl Default for QueryPipelineConfig {
    fn default() -> Self {
        Self {
            logging: true,
            metrics: true,
            validation: true,
            timeout_ms: Some(10_000),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl QueryPipelineConfig {
    pub(crate) fn build<D: Database>(&self, services: &PipelineServices<D>) -> Vec<Arc<dyn Middleware<D>>> {
        let mut chain: Vec<Arc<dyn Middleware<D>>> = Vec::new();
        if self.logging {
            chain.push(Arc::new(LoggingMiddleware));
        }
        if self.metrics {
            chain.push(Arc::new(MetricsMiddleware::new(Arc::clone(&services.metrics))));
        }
        if self.validation {
            chain.push(Arc::new(ValidationMiddleware));
        }
        if let Some(ms) = self.timeout_ms {
            chain.push(Arc::new(TimeoutMiddleware::new(Duration::from_millis(ms))));
        }
        if self.cache.enabled {
            if let Some(cache) = &services.cache {
                chain.push(Arc::new(CachingMiddleware::new(
                    Arc::clone(cache),
                    Duration::from_secs(self.cache.default_ttl_secs),
                )));
            }
        }
        if self.retry.enabled {
            chain.push(Arc::new(RetryMiddleware::new(self.retry.policy())));
        }
        chain
    }
}

/// Query result caching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache query results that declare a cache policy.
    pub enabled: bool,
    /// Lifetime for policies without their own TTL.
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_secs: 300,
        }
    }
}

/// Exponential backoff for transient query failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retry transient failures.
    pub enabled: bool,
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Cap on any single delay.
    pub max_backoff_ms: u64,
    /// Growth factor between delays.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Backoff policy described by this section.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.max_retries)
            .initial_delay(Duration::from_millis(self.initial_backoff_ms))
            .max_delay(Duration::from_millis(self.max_backoff_ms))
            .multiplier(self.multiplier)
            .build()
    }
}

/// Services the standard middleware depend on.
pub struct PipelineServices<D: Database> {
    /// Opens transactions for the transaction middleware.
    pub unit_of_work: UnitOfWork<D>,
    /// Backs caching and cache invalidation. `None` disables both.
    pub cache: Option<Arc<dyn Cache>>,
    /// Receives request counters and timings.
    pub metrics: Arc<dyn Metrics>,
    /// Receives committed events. `None` disables publication.
    pub publisher: Option<Arc<dyn EventPublisher>>,
}

impl<D: Database> PipelineServices<D> {
    /// Services with no cache and no metrics.
    #[must_use]
    pub fn new(unit_of_work: UnitOfWork<D>) -> Self {
        Self {
            unit_of_work,
            cache: None,
            metrics: Arc::new(NoopMetrics),
            publisher: None,
        }
    }

    /// Uses `cache` for caching and invalidation.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Reports to `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Publishes committed events to `publisher`.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Unit of work for command handling: publishes committed events when
    /// `command.event_publishing` is on and a publisher is configured.
    #[must_use]
    pub fn command_unit_of_work(&self, command: &CommandPipelineConfig) -> UnitOfWork<D> {
        match &self.publisher {
            Some(publisher) if command.event_publishing => self
                .unit_of_work
                .clone()
                .with_publisher(Arc::clone(publisher)),
            _ => self.unit_of_work.clone(),
        }
    }
}
