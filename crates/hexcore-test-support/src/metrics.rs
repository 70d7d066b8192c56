//! Metrics sink that remembers what it was told.

use std::sync::Mutex;

use hexcore_core::metrics::{MetricLabel, Metrics};

/// Records every counter increment and duration sample.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    counters: Mutex<Vec<(&'static str, Vec<MetricLabel>)>>,
    durations: Mutex<Vec<&'static str>>,
}

impl RecordingMetrics {
    /// Names of incremented counters, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn counters(&self) -> Vec<&'static str> {
        self.counters
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| *name)
            .collect()
    }

    /// Labels of the first increment of `name`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn labels_of(&self, name: &str) -> Option<Vec<MetricLabel>> {
        self.counters
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, labels)| labels.clone())
    }

    /// Names of recorded durations, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn durations(&self) -> Vec<&'static str> {
        self.durations.lock().unwrap().clone()
    }
}

impl Metrics for RecordingMetrics {
    fn increment_counter(&self, name: &'static str, labels: &[MetricLabel]) {
        self.counters.lock().unwrap().push((name, labels.to_vec()));
    }

    fn record_duration(&self, name: &'static str, _seconds: f64, _labels: &[MetricLabel]) {
        self.durations.lock().unwrap().push(name);
    }
}
