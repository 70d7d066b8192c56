//! In-process adapters.
//!
//! Writes are staged on a [`MemoryTransaction`] and applied to the shared
//! state in one step on commit, so a failed or abandoned unit of work
//! leaves no trace.

mod cache;
mod database;
mod event_store;
mod projection_store;

pub use cache::MemoryCache;
pub use database::{InMemoryDatabase, MemorySnapshot, MemoryTransaction};
pub use event_store::InMemoryEventStore;
pub use projection_store::InMemoryProjectionStore;
