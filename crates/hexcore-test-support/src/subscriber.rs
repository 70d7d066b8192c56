//! Event subscriber that remembers what it received.

use std::sync::Mutex;

use async_trait::async_trait;
use hexcore_core::error::DomainError;
use hexcore_core::event::StoredEvent;
use hexcore_core::publisher::EventSubscriber;

/// Records every delivered event.
#[derive(Debug, Default)]
pub struct RecordingSubscriber {
    received: Mutex<Vec<StoredEvent>>,
}

impl RecordingSubscriber {
    /// `(event_type, sequence_number)` of every delivery, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn received(&self) -> Vec<(String, i64)> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.event_type.clone(), e.sequence_number))
            .collect()
    }

    /// Full copies of every delivered event.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn events(&self) -> Vec<StoredEvent> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSubscriber for RecordingSubscriber {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn handle(&self, event: &StoredEvent) -> Result<(), DomainError> {
        self.received.lock().unwrap().push(event.clone());
        Ok(())
    }
}
