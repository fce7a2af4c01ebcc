//! # Internal Metrics Module
//!
//! - **`MetricsBuilder`** installs the Prometheus recorder and hands back the
//!   `PrometheusHandle` the web layer renders at `/metrics`.
//! - **`Metrics`** is the cloneable handle the rest of the application uses to
//!   update the predefined metrics.

use crate::config::MetricsConfig;
use metrics::{Counter, Histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tracing::error;

/// The public API for the metrics system.
#[derive(Clone)]
pub struct Metrics {
    pub reports_resolved_total: Counter,
    pub reports_not_found_total: Counter,
    pub reports_failed_total: Counter,
    pub report_resolution_duration_seconds: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance and registers descriptions for all
    /// supported metrics with the global recorder.
    pub fn new() -> Self {
        metrics::describe_counter!("reports_resolved_total", Unit::Count, "Recipient reports resolved, labeled by outcome.");
        metrics::describe_histogram!("report_resolution_duration_seconds", Unit::Seconds, "Time taken to resolve a recipient report.");
        metrics::describe_counter!("api_requests_total", Unit::Count, "Monitoring API calls, labeled by method and outcome.");

        Self {
            reports_resolved_total: metrics::counter!("reports_resolved_total", "outcome" => "ok"),
            reports_not_found_total: metrics::counter!("reports_resolved_total", "outcome" => "not_found"),
            reports_failed_total: metrics::counter!("reports_resolved_total", "outcome" => "upstream_error"),
            report_resolution_duration_seconds: metrics::histogram!("report_resolution_duration_seconds"),
        }
    }

    pub fn record_resolution(&self, duration: Duration) {
        self.report_resolution_duration_seconds
            .record(duration.as_secs_f64());
    }

    /// Increments the counter for a monitoring API call.
    pub fn increment_api_request(&self, method: &str, outcome: &str) {
        metrics::counter!(
            "api_requests_total",
            "method" => method.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }
}

/// Builder for the metrics system.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Installs the Prometheus recorder when metrics are enabled.
    ///
    /// Returns `None` for the handle when metrics are disabled or the recorder
    /// could not be installed; the `Metrics` handle is usable either way.
    pub fn build(self) -> (Metrics, Option<PrometheusHandle>) {
        if !self.config.enabled {
            return (Metrics::new(), None);
        }

        let builder = match PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        ) {
            Ok(builder) => builder,
            Err(e) => {
                error!("Failed to configure Prometheus buckets: {}", e);
                return (Metrics::new(), None);
            }
        };
        let recorder = builder.build_recorder();
        let handle = recorder.handle();

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (Metrics::new(), None);
        }

        (Metrics::new(), Some(handle))
    }
}
