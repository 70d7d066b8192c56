//! Wires the identity context onto an in-memory backend.

#![allow(dead_code)]

use std::sync::Arc;

use hexcore_core::cache::Cache;
use hexcore_core::clock::Clock;
use hexcore_core::publisher::{ALL_EVENTS, EventBus};
use hexcore_core::repository::AggregateRepository;
use hexcore_core::unit_of_work::UnitOfWork;
use hexcore_dispatch::{Dispatcher, PipelineConfig, PipelineServices};
use hexcore_identity::IdentityModule;
use hexcore_identity::domain::commands::{RegisterUser, UserCommandResult};
use hexcore_store::{InMemoryDatabase, InMemoryEventStore, InMemoryProjectionStore, MemoryCache};
use hexcore_test_support::{FixedClock, RecordingSubscriber};

pub const PASSWORD: &str = "Secret#123";

pub struct Harness {
    pub dispatcher: Dispatcher<InMemoryDatabase>,
    pub database: InMemoryDatabase,
    pub cache: Arc<MemoryCache>,
    pub published: Arc<RecordingSubscriber>,
}

pub fn harness() -> Harness {
    let database = InMemoryDatabase::new();
    let cache = Arc::new(MemoryCache::new());
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::default());
    let repository = AggregateRepository::new(
        Arc::new(InMemoryEventStore::new(&database)),
        Arc::new(InMemoryProjectionStore::new(&database)),
        Arc::clone(&clock),
    );
    let unit_of_work = UnitOfWork::new(Arc::new(database.clone()));
    let shared_cache: Arc<dyn Cache> = cache.clone();
    let published = Arc::new(RecordingSubscriber::default());
    let bus = EventBus::new().subscribe(ALL_EVENTS, published.clone());
    let services = PipelineServices::new(unit_of_work)
        .with_cache(Arc::clone(&shared_cache))
        .with_publisher(Arc::new(bus));
    let config = PipelineConfig::default();

    let builder = Dispatcher::builder().with_pipeline(&config, &services);
    let unit_of_work = services.command_unit_of_work(&config.command);
    let dispatcher = IdentityModule::new(repository, unit_of_work, shared_cache, clock)
        .register(builder)
        .expect("identity handlers register once")
        .build();

    Harness {
        dispatcher,
        database,
        cache,
        published,
    }
}

pub fn register_command(email: &str) -> RegisterUser {
    RegisterUser {
        email: email.to_owned(),
        password: PASSWORD.to_owned(),
        name: "Ada Lovelace".to_owned(),
        bio: "Analyst".to_owned(),
    }
}

pub async fn register(harness: &Harness, email: &str) -> UserCommandResult {
    harness
        .dispatcher
        .dispatch(register_command(email))
        .await
        .expect("registration succeeds")
}
