//! Wires adapters, the unit of work, the pipeline and the identity handlers
//! into a dispatcher.

use std::sync::Arc;

use hexcore_core::cache::Cache;
use hexcore_core::clock::Clock;
use hexcore_core::error::DomainError;
use hexcore_core::event_store::EventStore;
use hexcore_core::metrics::Metrics;
use hexcore_core::projection::ProjectionStore;
use hexcore_core::publisher::EventBus;
use hexcore_core::repository::AggregateRepository;
use hexcore_core::transaction::Database;
use hexcore_core::unit_of_work::UnitOfWork;
use hexcore_dispatch::{Dispatcher, PipelineConfig, PipelineServices};
use hexcore_identity::IdentityModule;
use hexcore_identity::application::event_listener::UserEventListener;
use hexcore_store::{
    InMemoryDatabase, InMemoryEventStore, InMemoryProjectionStore, MemoryCache, PgDatabase,
    PgEventStore, PgProjectionStore,
};
use tracing::info;

use crate::config::AppConfig;
use crate::error::AppError;

/// Storage and cache adapters for one backend.
pub struct Adapters<D: Database> {
    /// Transaction source.
    pub database: Arc<D>,
    /// Event log.
    pub events: Arc<dyn EventStore<D>>,
    /// Current-state projections.
    pub projections: Arc<dyn ProjectionStore<D>>,
    /// Query cache and login failure counters.
    pub cache: Arc<dyn Cache>,
}

impl Adapters<InMemoryDatabase> {
    /// Process-local adapters, used by tests and local runs.
    #[must_use]
    pub fn in_memory() -> Self {
        let database = InMemoryDatabase::new();
        Self {
            events: Arc::new(InMemoryEventStore::new(&database)),
            projections: Arc::new(InMemoryProjectionStore::new(&database)),
            cache: Arc::new(MemoryCache::new()),
            database: Arc::new(database),
        }
    }
}

impl Adapters<PgDatabase> {
    /// Connects to Postgres, applies pending migrations and picks a cache.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Startup` if the pool, the migrations or the cache
    /// connection fail.
    pub async fn postgres(config: &AppConfig) -> Result<Self, AppError> {
        let database = PgDatabase::connect(&config.database_url, config.max_connections).await?;
        database.migrate().await?;
        let pool = database.pool().clone();
        info!(max_connections = config.max_connections, "connected to postgres");

        Ok(Self {
            events: Arc::new(PgEventStore::new(pool.clone())),
            projections: Arc::new(PgProjectionStore::new(pool)),
            cache: cache_for(config).await?,
            database: Arc::new(database),
        })
    }
}

#[cfg(feature = "redis")]
async fn cache_for(config: &AppConfig) -> Result<Arc<dyn Cache>, DomainError> {
    match &config.redis_url {
        Some(url) => {
            let cache = hexcore_store::RedisCache::connect(url).await?;
            info!("using redis cache");
            Ok(Arc::new(cache))
        }
        None => Ok(Arc::new(MemoryCache::new())),
    }
}

#[cfg(not(feature = "redis"))]
#[allow(clippy::unused_async)]
async fn cache_for(config: &AppConfig) -> Result<Arc<dyn Cache>, DomainError> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL is set but the redis feature is disabled; using the in-memory cache");
    }
    Ok(Arc::new(MemoryCache::new()))
}

/// Builds the dispatcher with the standard pipeline and every identity
/// handler registered. Committed events go to an in-process bus carrying
/// the user event listener.
///
/// # Errors
///
/// Returns `DuplicateHandler` if two handlers claim the same request type.
pub fn build_dispatcher<D: Database>(
    adapters: Adapters<D>,
    pipeline: &PipelineConfig,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn Metrics>,
) -> Result<Dispatcher<D>, DomainError> {
    let Adapters {
        database,
        events,
        projections,
        cache,
    } = adapters;

    let unit_of_work = UnitOfWork::new(database).with_metrics(Arc::clone(&metrics));
    let repository = AggregateRepository::new(events, projections, Arc::clone(&clock));
    let listener = Arc::new(UserEventListener::new(Arc::clone(&cache), Arc::clone(&metrics)));
    let bus = listener.subscribe(EventBus::new().with_metrics(Arc::clone(&metrics)));
    let services = PipelineServices::new(unit_of_work)
        .with_cache(Arc::clone(&cache))
        .with_metrics(metrics)
        .with_publisher(Arc::new(bus));

    let builder = Dispatcher::builder().with_pipeline(pipeline, &services);
    let unit_of_work = services.command_unit_of_work(&pipeline.command);
    let dispatcher = IdentityModule::new(repository, unit_of_work, cache, clock)
        .register(builder)?
        .build();
    info!(?dispatcher, "dispatcher ready");
    Ok(dispatcher)
}
