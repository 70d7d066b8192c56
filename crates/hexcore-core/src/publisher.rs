//! Event publication.
//!
//! Persisted events are handed to an [`EventPublisher`] once the unit of
//! work that wrote them has committed. [`EventBus`] is the in-process
//! publisher: it routes each event to the subscribers registered for its
//! type, in sequence order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::DomainError;
use crate::event::StoredEvent;
use crate::metrics::{Metrics, NoopMetrics};

/// Subscription key that matches every event type.
pub const ALL_EVENTS: &str = "*";

/// Outbound port for committed events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Delivers `events`, already committed, in the order given.
    ///
    /// # Errors
    ///
    /// Returns `Infrastructure` when the transport cannot accept the events.
    async fn publish(&self, events: &[StoredEvent]) -> Result<(), DomainError>;
}

/// Receives events from an [`EventBus`].
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Reacts to one committed event.
    ///
    /// # Errors
    ///
    /// Any error is logged and counted by the bus; it never reaches the
    /// command that produced the event.
    async fn handle(&self, event: &StoredEvent) -> Result<(), DomainError>;
}

/// In-process publisher with per-type subscriptions.
pub struct EventBus {
    subscribers: HashMap<String, Vec<Arc<dyn EventSubscriber>>>,
    metrics: Arc<dyn Metrics>,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Counts handled and failed deliveries in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Subscribes `subscriber` to `event_type`, or to every type with
    /// [`ALL_EVENTS`].
    #[must_use]
    pub fn subscribe(mut self, event_type: &str, subscriber: Arc<dyn EventSubscriber>) -> Self {
        self.subscribers
            .entry(event_type.to_owned())
            .or_default()
            .push(subscriber);
        self
    }

    /// Number of subscriptions for `event_type`, wildcard excluded.
    #[must_use]
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.subscribers.get(event_type).map_or(0, Vec::len)
    }

    fn subscribers_for<'a>(
        &'a self,
        event_type: &'a str,
    ) -> impl Iterator<Item = &'a Arc<dyn EventSubscriber>> + 'a {
        [event_type, ALL_EVENTS]
            .into_iter()
            .filter_map(move |key| self.subscribers.get(key))
            .flatten()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.subscribers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    /// Subscriber failures are logged and counted, then delivery continues.
    async fn publish(&self, events: &[StoredEvent]) -> Result<(), DomainError> {
        for event in events {
            for subscriber in self.subscribers_for(&event.event_type) {
                let labels = [("event_type", event.event_type.clone())];
                match subscriber.handle(event).await {
                    Ok(()) => {
                        self.metrics.increment_counter("event_handle_success", &labels);
                        debug!(
                            subscriber = subscriber.name(),
                            event_type = %event.event_type,
                            event_id = %event.event_id,
                            "event handled"
                        );
                    }
                    Err(error) => {
                        self.metrics.increment_counter("event_handle_failure", &labels);
                        warn!(
                            subscriber = subscriber.name(),
                            event_type = %event.event_type,
                            event_id = %event.event_id,
                            %error,
                            "event subscriber failed"
                        );
                    }
                }
            }
        }
        Ok(())
    }
}
