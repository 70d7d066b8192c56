//! Shared test doubles for the hexcore workspace.

mod cache;
mod clock;
mod database;
mod metrics;
mod subscriber;

pub use cache::{FailingCache, RecordingCache};
pub use clock::{FixedClock, fixed_now};
pub use database::{CallLog, ScriptedDatabase};
pub use metrics::RecordingMetrics;
pub use subscriber::RecordingSubscriber;
