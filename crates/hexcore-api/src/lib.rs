//! HTTP surface for the hexcore identity service.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod telemetry;
