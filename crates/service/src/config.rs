//! Service configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Service configuration, read from `aqua-service.{toml,json,yaml}` and `AQUA_*` env vars
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Name reported in structured logs
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// HTTP port for prediction, health and metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Classification bundle manifest
    #[serde(default = "default_classifier_bundle")]
    pub classifier_bundle: PathBuf,

    /// Forecast bundle manifest
    #[serde(default = "default_forecast_bundle")]
    pub forecast_bundle: PathBuf,

    /// Keep serving when a bundle fails to load
    #[serde(default)]
    pub allow_degraded: bool,

    /// Browser origins allowed by CORS, comma separated
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_service_name() -> String {
    "aqua-ai-service".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_classifier_bundle() -> PathBuf {
    PathBuf::from("models/wqd_rf_3sensor_bundle.json")
}

fn default_forecast_bundle() -> PathBuf {
    PathBuf::from("models/pond_forecast_30min_bundle.json")
}

fn default_cors_origins() -> String {
    "http://localhost:3000,http://127.0.0.1:3000".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            api_port: default_api_port(),
            classifier_bundle: default_classifier_bundle(),
            forecast_bundle: default_forecast_bundle(),
            allow_degraded: false,
            cors_origins: default_cors_origins(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the optional config file and environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("aqua-service").required(false))
            .add_source(config::Environment::with_prefix("AQUA").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;
        Self::from_config(config)
    }

    pub fn from_config(config: config::Config) -> Result<Self> {
        config
            .try_deserialize()
            .context("Invalid service configuration")
    }

    /// CORS origins as a list, skipping blanks
    pub fn cors_origin_list(&self) -> Vec<&str> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .collect()
    }
}
