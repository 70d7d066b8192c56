//! Hexcore Core — ports and building blocks of the application core.
//!
//! This crate defines the aggregate and event abstractions, the storage,
//! cache, clock, metrics and event publication ports, the in-process event
//! bus, the transaction state machine, the unit of work and the generic
//! aggregate repository. It contains no infrastructure code.

pub mod aggregate;
pub mod cache;
pub mod clock;
pub mod error;
pub mod event;
pub mod event_store;
pub mod metrics;
pub mod projection;
pub mod publisher;
pub mod repository;
pub mod request;
pub mod transaction;
pub mod unit_of_work;
