//! Aggregate root abstraction.
//!
//! Aggregates keep their current state in memory and record one domain
//! event per successful business operation. Recorded events stay pending
//! until a repository has stored them, after which they are cleared.

use uuid::Uuid;

use crate::clock::Clock;
use crate::event::{DomainEvent, EventMetadata};

/// Trait for aggregate roots that record domain events.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate records.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the current version (number of events ever recorded).
    fn version(&self) -> i64;

    /// Returns events recorded since load or creation, oldest first.
    fn pending_events(&self) -> &[Self::Event];

    /// Clears pending events after persistence.
    fn clear_pending_events(&mut self);

    /// Version the store holds for this aggregate before the pending events.
    #[allow(clippy::cast_possible_wrap)]
    fn persisted_version(&self) -> i64 {
        self.version() - self.pending_events().len() as i64
    }
}

/// Identity, version and pending-event bookkeeping shared by aggregates.
#[derive(Debug, Clone)]
pub struct AggregateBase<E> {
    id: Uuid,
    version: i64,
    pending: Vec<E>,
}

impl<E: DomainEvent> AggregateBase<E> {
    /// Creates bookkeeping for a brand new aggregate.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self::restored(id, 0)
    }

    /// Creates bookkeeping for an aggregate loaded at `version`.
    #[must_use]
    pub fn restored(id: Uuid, version: i64) -> Self {
        Self {
            id,
            version,
            pending: Vec::new(),
        }
    }

    /// Returns the aggregate identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the current version.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns the pending events.
    #[must_use]
    pub fn pending(&self) -> &[E] {
        &self.pending
    }

    /// Builds metadata for the next event this aggregate will record.
    #[must_use]
    pub fn next_metadata(
        &self,
        event_type: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> EventMetadata {
        EventMetadata {
            event_id: Uuid::new_v4(),
            event_type: event_type.to_owned(),
            aggregate_id: self.id,
            sequence_number: self.version + 1,
            correlation_id,
            causation_id: correlation_id,
            occurred_at: clock.now(),
        }
    }

    /// Appends an event and bumps the version by one.
    pub fn record(&mut self, event: E) {
        self.version += 1;
        self.pending.push(event);
    }

    /// Drops pending events once they have been persisted.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::error::DomainError;

    #[derive(Debug)]
    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[derive(Debug)]
    struct Ticked(EventMetadata);

    impl DomainEvent for Ticked {
        fn event_type(&self) -> &'static str {
            "test.ticked"
        }

        fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
            Ok(serde_json::json!({}))
        }

        fn metadata(&self) -> &EventMetadata {
            &self.0
        }
    }

    struct Counter {
        base: AggregateBase<Ticked>,
    }

    impl Counter {
        fn tick(&mut self, clock: &dyn Clock) {
            let metadata = self.base.next_metadata("test.ticked", Uuid::new_v4(), clock);
            self.base.record(Ticked(metadata));
        }
    }

    impl AggregateRoot for Counter {
        type Event = Ticked;

        fn aggregate_id(&self) -> Uuid {
            self.base.id()
        }

        fn version(&self) -> i64 {
            self.base.version()
        }

        fn pending_events(&self) -> &[Ticked] {
            self.base.pending()
        }

        fn clear_pending_events(&mut self) {
            self.base.clear();
        }
    }

    #[test]
    fn test_n_operations_yield_version_n_and_n_ordered_pending_events() {
        // Arrange
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let mut counter = Counter {
            base: AggregateBase::new(Uuid::new_v4()),
        };

        // Act
        for _ in 0..4 {
            counter.tick(&clock);
        }

        // Assert
        assert_eq!(counter.version(), 4);
        assert_eq!(counter.persisted_version(), 0);
        let sequences: Vec<i64> = counter
            .pending_events()
            .iter()
            .map(|e| e.metadata().sequence_number)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
        assert!(
            counter
                .pending_events()
                .iter()
                .all(|e| e.metadata().occurred_at == clock.0)
        );
    }

    #[test]
    fn test_restored_aggregate_continues_from_loaded_version() {
        // Arrange
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let mut counter = Counter {
            base: AggregateBase::restored(Uuid::new_v4(), 7),
        };

        // Act
        counter.tick(&clock);

        // Assert
        assert_eq!(counter.version(), 8);
        assert_eq!(counter.persisted_version(), 7);
        assert_eq!(counter.pending_events()[0].metadata().sequence_number, 8);
    }

    #[test]
    fn test_clear_keeps_version_and_drops_pending() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let mut counter = Counter {
            base: AggregateBase::new(Uuid::new_v4()),
        };
        counter.tick(&clock);
        counter.tick(&clock);

        counter.clear_pending_events();

        assert_eq!(counter.version(), 2);
        assert_eq!(counter.persisted_version(), 2);
        assert!(counter.pending_events().is_empty());
    }
}
