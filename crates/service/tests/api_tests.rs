//! Integration tests for the service HTTP endpoints

use anyhow::Result;
use aqua_ai_service::api::{create_router, AppState};
use aqua_lib::{
    classifier::{
        ClassificationPipeline, ClassifierModel, ProbabilityModel, CLASSIFICATION_FEATURES,
    },
    forecast::{ForecastPipeline, ForecastSchema, RegressionModel},
    health::components,
    AquaEngine, CalibrationConstants, FeatureSchema, HealthRegistry, ServiceMetrics,
    StructuredLogger,
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Class 2 (POOR) when pH is far from neutral, class 1 (GOOD) otherwise
struct PhThreshold;

impl ProbabilityModel for PhThreshold {
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        // Schema below puts pH first
        if (row[0] - 7.5).abs() > 2.0 {
            Ok(vec![0.05, 0.15, 0.8])
        } else {
            Ok(vec![0.1, 0.85, 0.05])
        }
    }
}

/// Predicts the newest lag plus a fixed drift
struct Drift;

impl RegressionModel for Drift {
    fn predict(&self, row: &[f64]) -> Result<Vec<f64>> {
        Ok(vec![row[0] + 0.1, row[1] + 1.0, row[2] - 0.5])
    }
}

fn full_engine() -> AquaEngine {
    let mut names = vec!["pH"];
    names.extend(CLASSIFICATION_FEATURES.iter().filter(|n| **n != "pH"));
    let classification = ClassificationPipeline::new(
        FeatureSchema::new(names).unwrap(),
        CalibrationConstants::default(),
        ClassifierModel::Probabilistic(Box::new(PhThreshold)),
    )
    .unwrap()
    .with_version("wqd-test");

    let forecast = ForecastPipeline::new(
        FeatureSchema::new([
            "water_pH_lag1",
            "turbidity_ntu_lag1",
            "water_temp_lag1",
            "hour",
            "dayofweek",
        ])
        .unwrap(),
        ForecastSchema::default(),
        Box::new(Drift),
    )
    .unwrap()
    .with_version("forecast-test");

    AquaEngine::new(Some(classification), Some(forecast))
}

async fn setup_test_app(engine: AquaEngine) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::CLASSIFIER).await;
    health_registry.register(components::FORECASTER).await;
    health_registry.set_ready(true).await;

    let state = Arc::new(AppState::new(
        Arc::new(engine),
        health_registry,
        ServiceMetrics::new(),
        StructuredLogger::new("aqua-test"),
    ));
    (create_router(state.clone()), state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_models_and_forecast_meta() {
    let (app, _state) = setup_test_app(full_engine()).await;
    let (status, body) = send(app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["models"]["classification_loaded"], true);
    assert_eq!(body["models"]["forecast_loaded"], true);
    assert_eq!(body["forecast_meta"]["n_lags"], 6);
    assert_eq!(body["forecast_meta"]["horizon_steps"], 1);
    assert_eq!(body["forecast_meta"]["horizon_minutes"], 30);
    assert_eq!(
        body["forecast_meta"]["sensor_cols"],
        json!(["water_pH", "turbidity_ntu", "water_temp"])
    );
}

#[tokio::test]
async fn test_predict_good_water() {
    let (app, _state) = setup_test_app(full_engine()).await;
    let (status, body) = send(
        app,
        post_json(
            "/predict",
            json!({"ph": 7.5, "turbidity": 10.0, "temperature": 27.0}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["water_quality_label"], "GOOD");
    assert_eq!(body["water_quality_class"], 1);
    assert_eq!(body["confidence"], 0.85);
    assert_eq!(body["recommend"], "PUMP_OFF");
    assert_eq!(body["duration"], 0);
    assert_eq!(body["details"]["ph"], 7.5);
    assert_eq!(body["details"]["stress_score"], 0.25);
}

#[tokio::test]
async fn test_predict_poor_water_turns_pump_on() {
    let (app, _state) = setup_test_app(full_engine()).await;
    let (status, body) = send(
        app,
        post_json(
            "/predict",
            json!({"ph": 4.0, "turbidity": 60.0, "temperature": 35.0}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["water_quality_label"], "POOR");
    assert_eq!(body["recommend"], "PUMP_ON");
    assert_eq!(body["duration"], 119);
}

#[tokio::test]
async fn test_predict_rejects_malformed_body() {
    let (app, _state) = setup_test_app(full_engine()).await;
    let (status, body) = send(app, post_json("/predict", json!({"ph": 7.0}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_predict_rejects_negative_turbidity() {
    let (app, _state) = setup_test_app(full_engine()).await;
    let (status, body) = send(
        app,
        post_json(
            "/predict",
            json!({"ph": 7.0, "turbidity": -1.0, "temperature": 27.0}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_forecast_from_current_reading() {
    let (app, _state) = setup_test_app(full_engine()).await;
    let (status, body) = send(
        app,
        post_json(
            "/forecast",
            json!({"ph": 7.0, "turbidity": 20.0, "temperature": 28.0}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["horizon_minutes"], 30);
    assert_eq!(body["ph"], 7.1);
    assert_eq!(body["turbidity"], 21.0);
    assert_eq!(body["temperature"], 27.5);
}

#[tokio::test]
async fn test_forecast_from_aliased_history() {
    let (app, _state) = setup_test_app(full_engine()).await;
    let history = json!([
        {"timestamp": "2024-05-07T08:30:00+07:00", "pH": 7.4, "turb": 12.0, "temp": 26.0},
        {"timestamp": "2024-05-07T08:00:00+07:00", "pH": 7.2, "turb": 11.0, "temp": 25.5},
    ]);
    let (status, body) = send(app, post_json("/forecast", json!({ "history": history }))).await;

    // Rows are sorted by timestamp, so the 08:30 row is the newest lag
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ph"], 7.5);
    assert_eq!(body["turbidity"], 13.0);
    assert_eq!(body["temperature"], 25.5);
}

#[tokio::test]
async fn test_forecast_without_input_is_insufficient() {
    let (app, _state) = setup_test_app(full_engine()).await;
    let (status, body) = send(app, post_json("/forecast", json!({"ph": 7.0}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_INPUT");
}

#[tokio::test]
async fn test_forecast_unresolvable_history_column() {
    let (app, _state) = setup_test_app(full_engine()).await;
    let history = json!([
        {"ph": 7.0, "turbidity": 10.0, "temperature": 27.0},
        {"ph": 7.1, "salinity": 3.0, "temperature": 27.2},
    ]);
    let (status, body) = send(
        app,
        post_json(
            "/forecast",
            json!({"ph": 7.1, "turbidity": 10.0, "temperature": 27.2, "history": history}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "UNRESOLVABLE_COLUMN");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("turbidity_ntu"));
}

#[tokio::test]
async fn test_missing_model_returns_service_unavailable() {
    let (app, _state) = setup_test_app(AquaEngine::default()).await;

    let (status, body) = send(
        app.clone(),
        post_json(
            "/predict",
            json!({"ph": 7.5, "turbidity": 10.0, "temperature": 27.0}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "MODEL_NOT_LOADED");

    let (status, body) = send(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"]["classification_loaded"], false);
    assert_eq!(body["forecast_meta"]["n_lags"], 6);
    assert_eq!(body["forecast_meta"]["horizon_minutes"], 30);
    assert!(body["forecast_meta"].get("version").is_none());
}

#[tokio::test]
async fn test_healthz_and_readyz() {
    let (app, state) = setup_test_app(full_engine()).await;

    let (status, body) = send(app.clone(), get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(app.clone(), get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);

    state
        .health_registry
        .set_unhealthy(components::FORECASTER, "bundle missing")
        .await;

    let (status, _) = send(app.clone(), get("/healthz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = send(app, get("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _state) = setup_test_app(full_engine()).await;
    let _ = send(
        app.clone(),
        post_json(
            "/predict",
            json!({"ph": 7.5, "turbidity": 10.0, "temperature": 27.0}),
        ),
    )
    .await;

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("aqua_classifications_total"));
    assert!(text.contains("aqua_inference_latency_seconds"));
}
