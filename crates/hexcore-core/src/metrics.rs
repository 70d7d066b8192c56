//! Metrics port.

/// Label attached to a metric sample.
pub type MetricLabel = (&'static str, String);

/// Sink for counters and timings emitted by the core.
pub trait Metrics: Send + Sync {
    /// Adds one to the named counter.
    fn increment_counter(&self, name: &'static str, labels: &[MetricLabel]);

    /// Records a duration sample, in seconds, for the named histogram.
    fn record_duration(&self, name: &'static str, seconds: f64, labels: &[MetricLabel]);
}

/// Metrics sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn increment_counter(&self, _name: &'static str, _labels: &[MetricLabel]) {}

    fn record_duration(&self, _name: &'static str, _seconds: f64, _labels: &[MetricLabel]) {}
}
