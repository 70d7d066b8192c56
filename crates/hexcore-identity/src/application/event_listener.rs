//! Reacts to committed user events.

use std::sync::Arc;

use async_trait::async_trait;
use hexcore_core::cache::Cache;
use hexcore_core::error::DomainError;
use hexcore_core::event::StoredEvent;
use hexcore_core::metrics::Metrics;
use hexcore_core::publisher::{EventBus, EventSubscriber};
use tracing::{debug, warn};

use crate::domain::commands::user_cache_key;

/// Event types the listener subscribes to.
pub const LISTENED_EVENTS: [&str; 4] = [
    "user.created",
    "user.profile_updated",
    "user.status_changed",
    "user.logged_in",
];

/// Counts registrations and logins and drops the cached view of users
/// whose profile or status changed.
pub struct UserEventListener {
    cache: Arc<dyn Cache>,
    metrics: Arc<dyn Metrics>,
}

impl UserEventListener {
    /// Creates a listener over the query cache.
    #[must_use]
    pub fn new(cache: Arc<dyn Cache>, metrics: Arc<dyn Metrics>) -> Self {
        Self { cache, metrics }
    }

    /// Subscribes this listener to every event in [`LISTENED_EVENTS`].
    #[must_use]
    pub fn subscribe(self: Arc<Self>, bus: EventBus) -> EventBus {
        LISTENED_EVENTS.iter().fold(bus, |bus, event_type| {
            bus.subscribe(event_type, Arc::clone(&self) as Arc<dyn EventSubscriber>)
        })
    }

    async fn forget_user(&self, event: &StoredEvent) {
        let key = user_cache_key(event.aggregate_id);
        if let Err(error) = self.cache.delete(&key).await {
            warn!(%key, %error, "failed to clear user cache");
        }
    }
}

impl std::fmt::Debug for UserEventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserEventListener").finish_non_exhaustive()
    }
}

#[async_trait]
impl EventSubscriber for UserEventListener {
    fn name(&self) -> &'static str {
        "user_event_listener"
    }

    async fn handle(&self, event: &StoredEvent) -> Result<(), DomainError> {
        match event.event_type.as_str() {
            "user.created" => self.metrics.increment_counter("user_created", &[]),
            "user.logged_in" => self.metrics.increment_counter("user_logged_in", &[]),
            "user.profile_updated" | "user.status_changed" => self.forget_user(event).await,
            other => debug!(event_type = other, "ignoring event"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hexcore_core::publisher::EventPublisher;
    use hexcore_test_support::{RecordingCache, RecordingMetrics, fixed_now};
    use uuid::Uuid;

    use super::*;

    fn event(event_type: &str, aggregate_id: Uuid) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id,
            event_type: event_type.to_owned(),
            payload: serde_json::json!({}),
            sequence_number: 2,
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            occurred_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn test_profile_update_drops_the_cached_view() {
        // Arrange
        let id = Uuid::new_v4();
        let cache = Arc::new(RecordingCache::default());
        cache.insert(&user_cache_key(id), "{}");
        let listener = UserEventListener::new(cache.clone(), Arc::new(RecordingMetrics::default()));

        // Act
        listener.handle(&event("user.profile_updated", id)).await.unwrap();

        // Assert
        assert!(cache.value(&user_cache_key(id)).is_none());
    }

    #[tokio::test]
    async fn test_subscribed_listener_counts_registrations_and_logins() {
        // Arrange
        let metrics = Arc::new(RecordingMetrics::default());
        let listener = Arc::new(UserEventListener::new(
            Arc::new(RecordingCache::default()),
            metrics.clone(),
        ));
        let bus = listener.subscribe(EventBus::new());
        let id = Uuid::new_v4();

        // Act
        bus.publish(&[
            event("user.created", id),
            event("user.logged_in", id),
            event("user.role_assigned", id),
        ])
        .await
        .unwrap();

        // Assert
        assert_eq!(metrics.counters(), vec!["user_created", "user_logged_in"]);
        assert_eq!(bus.subscriber_count("user.role_assigned"), 0);
    }
}
