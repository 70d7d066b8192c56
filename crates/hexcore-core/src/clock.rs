//! Injectable time source.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of event and projection timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_clock_delegates_to_inner_clock() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let before = Utc::now();

        let now = clock.now();

        assert!(now >= before);
    }
}
