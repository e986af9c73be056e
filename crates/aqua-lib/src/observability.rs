//! Observability for the prediction service
//!
//! Provides:
//! - Prometheus metrics (inference latency, labels, pump actions, errors, model info)
//! - Structured event logging with tracing

use crate::models::{ClassificationResult, ForecastResult};
use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_counter_vec, GaugeVec, HistogramVec,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Latency buckets in seconds
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Pipeline label values
pub const CLASSIFICATION: &str = "classification";
pub const FORECAST: &str = "forecast";

static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    inference_latency_seconds: HistogramVec,
    classifications: IntCounterVec,
    pump_recommendations: IntCounterVec,
    request_errors: IntCounterVec,
    model_info: GaugeVec,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            inference_latency_seconds: register_histogram_vec!(
                "aqua_inference_latency_seconds",
                "Time spent building features and running inference",
                &["pipeline"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            classifications: register_int_counter_vec!(
                "aqua_classifications_total",
                "Water quality classifications by predicted label",
                &["label"]
            )
            .expect("Failed to register classifications_total"),

            pump_recommendations: register_int_counter_vec!(
                "aqua_pump_recommendations_total",
                "Pump recommendations by action",
                &["action"]
            )
            .expect("Failed to register pump_recommendations_total"),

            request_errors: register_int_counter_vec!(
                "aqua_request_errors_total",
                "Failed prediction requests by error code",
                &["code"]
            )
            .expect("Failed to register request_errors_total"),

            model_info: register_gauge_vec!(
                "aqua_model_info",
                "Loaded model bundles",
                &["pipeline", "version"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Handle to the process-wide service metrics; clones share one registry
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

    pub fn observe_inference_latency(&self, pipeline: &str, duration_secs: f64) {
        self.inner()
            .inference_latency_seconds
            .with_label_values(&[pipeline])
            .observe(duration_secs);
    }

    /// Count a classification and the pump action it produced
    pub fn record_classification(&self, result: &ClassificationResult) {
        let label = result.label.to_string();
        self.inner()
            .classifications
            .with_label_values(&[label.as_str()])
            .inc();
        self.inner()
            .pump_recommendations
            .with_label_values(&[result.recommendation.action.as_str()])
            .inc();
    }

    pub fn inc_request_errors(&self, code: &str) {
        self.inner().request_errors.with_label_values(&[code]).inc();
    }

    /// Publish the version of a loaded bundle
    pub fn set_model_version(&self, pipeline: &str, version: &str) {
        self.inner()
            .model_info
            .with_label_values(&[pipeline, version])
            .set(1.0);
    }
}

/// Event logger for service lifecycle and predictions
#[derive(Clone)]
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn log_startup(&self, version: &str, degraded: bool) {
        info!(
            event = "service_started",
            service = %self.service_name,
            service_version = %version,
            degraded = degraded,
            "Water quality service started"
        );
    }

    pub fn log_model_loaded(&self, pipeline: &str, manifest: &str, version: &str) {
        info!(
            event = "model_loaded",
            service = %self.service_name,
            pipeline = %pipeline,
            manifest = %manifest,
            model_version = %version,
            "Model bundle loaded"
        );
    }

    pub fn log_model_load_failed(&self, pipeline: &str, manifest: &str, code: &str, error: &str) {
        warn!(
            event = "model_load_failed",
            service = %self.service_name,
            pipeline = %pipeline,
            manifest = %manifest,
            code = %code,
            error = %error,
            "Model bundle failed to load"
        );
    }

    pub fn log_classification(&self, result: &ClassificationResult, model_version: &str) {
        if result.label.is_poor() {
            warn!(
                event = "classification",
                service = %self.service_name,
                label = %result.label,
                class_index = result.class_index,
                confidence = result.confidence,
                stress_score = result.stress_score,
                action = result.recommendation.action.as_str(),
                duration_seconds = result.recommendation.duration_seconds,
                model_version = %model_version,
                "Poor water quality, pump recommended"
            );
        } else {
            info!(
                event = "classification",
                service = %self.service_name,
                label = %result.label,
                class_index = result.class_index,
                confidence = result.confidence,
                stress_score = result.stress_score,
                action = result.recommendation.action.as_str(),
                model_version = %model_version,
                "Water quality classified"
            );
        }
    }

    pub fn log_forecast(&self, result: &ForecastResult, history_rows: usize, model_version: &str) {
        info!(
            event = "forecast",
            service = %self.service_name,
            horizon_minutes = result.horizon_minutes,
            ph = result.ph,
            turbidity = result.turbidity,
            temperature = result.temperature,
            history_rows = history_rows,
            model_version = %model_version,
            "Pond conditions forecast"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service_name,
            reason = %reason,
            "Water quality service shutting down"
        );
    }
}
