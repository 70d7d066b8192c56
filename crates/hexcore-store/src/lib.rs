//! Storage and cache adapters for the hexcore ports.
//!
//! - [`postgres`] backs the event store and projections with `PostgreSQL`.
//! - [`memory`] keeps everything in process, with the same transactional
//!   behaviour, for tests and local runs.
//! - `redis_cache` (feature `redis`) backs the cache port with Redis.

pub mod memory;
pub mod postgres;
#[cfg(feature = "redis")]
pub mod redis_cache;
pub mod schema;

pub use memory::{InMemoryDatabase, InMemoryEventStore, InMemoryProjectionStore, MemoryCache};
pub use postgres::{PgDatabase, PgEventStore, PgProjectionStore};
#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;
