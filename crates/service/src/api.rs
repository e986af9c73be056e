//! HTTP API for predictions, health checks and Prometheus metrics

use aqua_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::{ServiceMetrics, StructuredLogger, CLASSIFICATION, FORECAST},
    AquaEngine, ClassificationResult, EngineStatus, ForecastRequest, ForecastResult,
    PipelineError, QualityLabel, SensorReading,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AquaEngine>,
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        engine: Arc<AquaEngine>,
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            engine,
            health_registry,
            metrics,
            logger,
        }
    }

    /// Count a failed request and wrap it for the response
    fn reject(&self, err: PipelineError) -> ApiError {
        self.metrics.inc_request_errors(err.code());
        if err.is_client_error() {
            warn!(code = err.code(), error = %err, "Rejected request");
        } else {
            error!(code = err.code(), error = %err, "Request failed");
        }
        ApiError(err)
    }
}

/// Pipeline error rendered as `{success: false, error: {code, message}}`
#[derive(Debug)]
pub struct ApiError(pub PipelineError);

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PipelineError::ModelNotLoaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.0.code().to_string(),
                message: self.0.to_string(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

fn invalid_body(rejection: JsonRejection) -> PipelineError {
    PipelineError::InvalidInput(rejection.body_text())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PredictRequest {
    pub ph: f64,
    pub turbidity: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictDetails {
    pub ph: f64,
    pub turbidity: f64,
    pub temperature: f64,
    pub stress_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub water_quality_label: QualityLabel,
    pub water_quality_class: i64,
    pub confidence: f64,
    pub recommend: &'static str,
    pub duration: u32,
    pub details: PredictDetails,
}

impl PredictResponse {
    fn new(request: &PredictRequest, result: &ClassificationResult) -> Self {
        Self {
            success: true,
            water_quality_label: result.label,
            water_quality_class: result.class_index,
            confidence: result.confidence,
            recommend: result.recommendation.action.as_str(),
            duration: result.recommendation.duration_seconds,
            details: PredictDetails {
                ph: request.ph,
                turbidity: request.turbidity,
                temperature: request.temperature,
                stress_score: result.stress_score,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastResponse {
    pub success: bool,
    #[serde(flatten)]
    pub forecast: ForecastResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub success: bool,
    #[serde(flatten)]
    pub status: EngineStatus,
}

/// Run a model call on the blocking pool, off the async workers
async fn run_blocking<T, F>(call: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .unwrap_or_else(|e| Err(PipelineError::Inference(format!("inference task failed: {}", e))))
}

/// Model status and forecast metadata
async fn health(State(state): State<Arc<AppState>>) -> Json<ServiceHealth> {
    Json(ServiceHealth {
        success: true,
        status: state.engine.status(),
    })
}

/// Classify a reading and recommend a pump action
async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload.map_err(|r| state.reject(invalid_body(r)))?;
    let reading = SensorReading::new(request.ph, request.turbidity, request.temperature);

    let start = Instant::now();
    let engine = state.engine.clone();
    let result = run_blocking(move || engine.classify(&reading))
        .await
        .map_err(|e| state.reject(e))?;
    state
        .metrics
        .observe_inference_latency(CLASSIFICATION, start.elapsed().as_secs_f64());
    state.metrics.record_classification(&result);

    let version = state.engine.classification().map_or("", |p| p.version());
    state.logger.log_classification(&result, version);

    Ok(Json(PredictResponse::new(&request, &result)))
}

/// Forecast pond conditions one horizon ahead
async fn forecast(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ForecastRequest>, JsonRejection>,
) -> Result<Json<ForecastResponse>, ApiError> {
    let Json(request) = payload.map_err(|r| state.reject(invalid_body(r)))?;
    let history_rows = request.history().map_or(0, <[_]>::len);

    let start = Instant::now();
    let engine = state.engine.clone();
    let result = run_blocking(move || engine.forecast(&request))
        .await
        .map_err(|e| state.reject(e))?;
    state
        .metrics
        .observe_inference_latency(FORECAST, start.elapsed().as_secs_f64());

    let version = state.engine.forecast_pipeline().map_or("", |p| p.version());
    state.logger.log_forecast(&result, history_rows, version);

    Ok(Json(ForecastResponse {
        success: true,
        forecast: result,
    }))
}

/// Liveness - 200 unless a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// CORS for the dashboard frontend; unparsable origins are skipped
pub fn cors_layer(origins: &[&str]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/forecast", post(forecast))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the API server, stopping when `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    cors: CorsLayer,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state).layer(cors);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (PipelineError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (PipelineError::InsufficientInput("x".into()), StatusCode::BAD_REQUEST),
            (
                PipelineError::UnresolvableColumn {
                    row: 0,
                    column: "water_pH".into(),
                    accepted: "water_pH, pH, ph".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (PipelineError::ModelNotLoaded("classifier"), StatusCode::SERVICE_UNAVAILABLE),
            (PipelineError::Inference("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                PipelineError::BundleLoad {
                    path: PathBuf::from("m.json"),
                    reason: "x".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[tokio::test]
    async fn test_run_blocking_returns_call_result() {
        assert_eq!(run_blocking(|| Ok(2 + 2)).await, Ok(4));

        let err = run_blocking(|| -> Result<(), PipelineError> {
            Err(PipelineError::InvalidInput("negative turbidity".into()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_run_blocking_reports_panicked_call() {
        let err = run_blocking(|| -> Result<(), PipelineError> { panic!("model crashed") })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INFERENCE_FAILED");
        assert_eq!(ApiError(err).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_cors_layer_skips_invalid_origins() {
        // Construction must not panic on a header-invalid origin
        let _layer = cors_layer(&["http://localhost:3000", "bad\norigin"]);
    }
}
