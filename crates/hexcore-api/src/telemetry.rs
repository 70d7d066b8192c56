//! Logging and metrics setup.

use std::net::SocketAddr;

use hexcore_core::metrics::{MetricLabel, Metrics};
use metrics::Label;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Histogram buckets, in seconds, for every `*_duration` metric.
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Installs the JSON tracing subscriber, filtered by `RUST_LOG` (default
/// `info`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();
}

/// Prometheus exporter with the duration buckets applied.
///
/// # Errors
///
/// Returns `AppError::Metrics` if the bucket configuration is rejected.
pub fn prometheus_builder() -> Result<PrometheusBuilder, AppError> {
    Ok(PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("duration".to_owned()), DURATION_BUCKETS)?)
}

/// Installs the global Prometheus recorder and serves `/metrics` on `addr`.
///
/// Must run inside the Tokio runtime. Fails if a recorder is already
/// installed.
///
/// # Errors
///
/// Returns `AppError::Metrics` if the exporter cannot be built or bound.
pub fn install_metrics_exporter(addr: SocketAddr) -> Result<(), AppError> {
    prometheus_builder()?.with_http_listener(addr).install()?;
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}

/// Forwards dispatcher, unit-of-work and event bus metrics to the `metrics`
/// facade, which the binary backs with the Prometheus exporter.
#[derive(Debug, Clone, Copy, Default)]
pub struct FacadeMetrics;

fn to_labels(labels: &[MetricLabel]) -> Vec<Label> {
    labels
        .iter()
        .map(|(key, value)| Label::new(*key, value.clone()))
        .collect()
}

impl Metrics for FacadeMetrics {
    fn increment_counter(&self, name: &'static str, labels: &[MetricLabel]) {
        metrics::counter!(name, to_labels(labels)).increment(1);
    }

    fn record_duration(&self, name: &'static str, seconds: f64, labels: &[MetricLabel]) {
        metrics::histogram!(name, to_labels(labels)).record(seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_samples_reach_the_prometheus_recorder() {
        // Arrange
        let recorder = prometheus_builder().unwrap().build_recorder();
        let handle = recorder.handle();

        // Act
        metrics::with_local_recorder(&recorder, || {
            FacadeMetrics.increment_counter("command_total", &[("command", "RegisterUser".to_owned())]);
            FacadeMetrics.record_duration("uow_commit_duration", 0.02, &[]);
        });

        // Assert
        let rendered = handle.render();
        assert!(rendered.contains(r#"command_total{command="RegisterUser"} 1"#));
        assert!(rendered.contains("uow_commit_duration_bucket"));
    }
}
