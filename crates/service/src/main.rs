//! Aqua AI Service - pond water quality classification and forecasting
//!
//! Loads both model bundles at startup and serves predictions over HTTP.

use anyhow::Result;
use aqua_ai_service::{api, config::ServiceConfig};
use aqua_lib::{
    classifier::ClassificationPipeline,
    forecast::ForecastPipeline,
    health::components,
    load_classification_bundle, load_forecast_bundle,
    observability::{CLASSIFICATION, FORECAST},
    AquaEngine, HealthRegistry, PipelineError, ServiceMetrics, StructuredLogger,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared handles used while loading bundles
struct Startup<'a> {
    allow_degraded: bool,
    health_registry: &'a HealthRegistry,
    metrics: &'a ServiceMetrics,
    logger: &'a StructuredLogger,
}

impl Startup<'_> {
    /// Record a bundle load; a failure aborts startup unless degraded mode is on
    async fn settle<T>(
        &self,
        component: &str,
        pipeline: &str,
        manifest: &Path,
        outcome: Result<T, PipelineError>,
        version: fn(&T) -> &str,
    ) -> Result<Option<T>> {
        self.health_registry.record_load(component, &outcome).await;
        let manifest_name = manifest.display().to_string();
        match outcome {
            Ok(loaded) => {
                self.metrics.set_model_version(pipeline, version(&loaded));
                self.logger
                    .log_model_loaded(pipeline, &manifest_name, version(&loaded));
                Ok(Some(loaded))
            }
            Err(e) => {
                self.logger
                    .log_model_load_failed(pipeline, &manifest_name, e.code(), &e.to_string());
                if !self.allow_degraded {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to load {} bundle", pipeline)));
                }
                warn!(pipeline = %pipeline, "Continuing without model (degraded mode)");
                Ok(None)
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting aqua-ai-service");

    let config = ServiceConfig::load()?;
    info!(
        service = %config.service_name,
        api_port = config.api_port,
        allow_degraded = config.allow_degraded,
        "Service configured"
    );

    let health_registry = HealthRegistry::new();
    let metrics = ServiceMetrics::new();
    let logger = StructuredLogger::new(&config.service_name);

    let startup = Startup {
        allow_degraded: config.allow_degraded,
        health_registry: &health_registry,
        metrics: &metrics,
        logger: &logger,
    };
    let classification = startup
        .settle(
            components::CLASSIFIER,
            CLASSIFICATION,
            &config.classifier_bundle,
            load_classification_bundle(&config.classifier_bundle),
            ClassificationPipeline::version,
        )
        .await?;
    let forecast = startup
        .settle(
            components::FORECASTER,
            FORECAST,
            &config.forecast_bundle,
            load_forecast_bundle(&config.forecast_bundle),
            ForecastPipeline::version,
        )
        .await?;

    let degraded = classification.is_none() || forecast.is_none();
    let engine = Arc::new(AquaEngine::new(classification, forecast));
    logger.log_startup(SERVICE_VERSION, degraded);

    let cors = api::cors_layer(&config.cors_origin_list());
    let app_state = Arc::new(api::AppState::new(
        engine,
        health_registry.clone(),
        metrics,
        logger.clone(),
    ));

    health_registry.set_ready(true).await;

    api::serve(config.api_port, app_state, cors, shutdown_signal()).await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
