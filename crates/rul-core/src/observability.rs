//! Observability infrastructure for the RUL service
//!
//! Provides:
//! - Prometheus metrics (prediction latency, predictions and errors by kind, artifact loads)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{error, info};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: HistogramVec,
    predictions: IntCounterVec,
    prediction_errors: IntCounterVec,
    artifact_loads: IntCounterVec,
    model_cache_hits: IntCounter,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram_vec!(
                "rul_prediction_latency_seconds",
                "Time spent preparing features and running inference per request",
                &["subsystem"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions: register_int_counter_vec!(
                "rul_predictions_total",
                "Total number of RUL estimates returned",
                &["subsystem"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors: register_int_counter_vec!(
                "rul_prediction_errors_total",
                "Total number of failed prediction requests by error kind",
                &["subsystem", "kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            artifact_loads: register_int_counter_vec!(
                "rul_artifact_loads_total",
                "Total number of model artifacts loaded from disk",
                &["format"]
            )
            .expect("Failed to register artifact_loads_total"),

            model_cache_hits: register_int_counter!(
                "rul_model_cache_hits_total",
                "Total number of model lookups served from the cache"
            )
            .expect("Failed to register model_cache_hits_total"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// Clones share the same process-wide metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, subsystem: &str, duration_secs: f64) {
        self.inner()
            .prediction_latency_seconds
            .with_label_values(&[subsystem])
            .observe(duration_secs);
    }

    pub fn add_predictions(&self, subsystem: &str, count: usize) {
        self.inner()
            .predictions
            .with_label_values(&[subsystem])
            .inc_by(count as u64);
    }

    pub fn inc_prediction_errors(&self, subsystem: &str, kind: &str) {
        self.inner()
            .prediction_errors
            .with_label_values(&[subsystem, kind])
            .inc();
    }

    pub fn inc_artifact_loads(&self, format: &str) {
        self.inner().artifact_loads.with_label_values(&[format]).inc();
    }

    pub fn inc_cache_hits(&self) {
        self.inner().model_cache_hits.inc();
    }
}

/// Structured logger for service events
///
/// Emits event-tagged records for predictions, artifact loads and
/// lifecycle transitions.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_prediction(
        &self,
        subsystem: &str,
        batch_size: usize,
        model_version: &str,
        model_file: &str,
        elapsed_ms: f64,
    ) {
        info!(
            event = "prediction_generated",
            instance = %self.instance,
            subsystem = %subsystem,
            batch_size = batch_size,
            model_version = %model_version,
            model_file = %model_file,
            elapsed_ms = elapsed_ms,
            "Generated RUL prediction"
        );
    }

    pub fn log_prediction_failure(&self, subsystem: &str, kind: &str, message: &str) {
        error!(
            event = "prediction_failed",
            instance = %self.instance,
            subsystem = %subsystem,
            kind = %kind,
            error = %message,
            "RUL prediction failed"
        );
    }

    pub fn log_model_load(&self, name: &str, file: &str, format: &str, checksum: &str, cached: bool) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            model = %name,
            file = %file,
            format = %format,
            checksum = %checksum,
            cached = cached,
            "Model artifact resolved"
        );
    }

    pub fn log_startup(&self, version: &str, models_dir: &Path, cache_models: bool) {
        info!(
            event = "service_started",
            instance = %self.instance,
            service_version = %version,
            models_dir = %models_dir.display(),
            cache_models = cache_models,
            "RUL service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "RUL service shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_metrics_creation() {
        let metrics = ServiceMetrics::new();
        metrics.observe_prediction_latency("engine", 0.002);
        metrics.add_predictions("engine", 3);
        metrics.inc_prediction_errors("hydraulics", "ArtifactNotFound");
        metrics.inc_artifact_loads("trusted");
        metrics.inc_cache_hits();

        // Clones share the global registry
        let again = metrics.clone();
        again.add_predictions("engine", 1);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-instance");
        assert_eq!(logger.instance, "test-instance");
    }
}
