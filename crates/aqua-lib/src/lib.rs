//! Core library for the pond water-quality service
//!
//! This crate provides:
//! - Feature engineering and classification of sensor readings
//! - Pump recommendations derived from the water stress score
//! - Short-horizon forecasting from lagged sensor history
//! - ONNX model bundles loaded with tract
//! - Health checks and observability

pub mod bundle;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod health;
pub mod models;
pub mod observability;
pub mod onnx;
pub mod schema;

pub use bundle::{load_classification_bundle, load_forecast_bundle};
pub use engine::{AquaEngine, EngineStatus, ForecastMeta, ModelsLoaded};
pub use error::PipelineError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use schema::{FeatureSchema, FeatureSource};
