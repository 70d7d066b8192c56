//! hexcore — user identity bounded context.
//!
//! Users register, maintain a profile, hold roles, move through account
//! statuses and log in. Every change is recorded as a `user.*` event next
//! to a current-state projection.

pub mod application;
pub mod domain;

pub use application::IdentityModule;
