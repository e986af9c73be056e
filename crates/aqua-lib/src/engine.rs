//! Prediction engine combining both pipelines
//!
//! The engine is built once at startup and shared behind an `Arc`. Either
//! pipeline may be absent when the service runs degraded; requests against
//! a missing pipeline fail with `MODEL_NOT_LOADED`.

use crate::classifier::ClassificationPipeline;
use crate::error::PipelineError;
use crate::forecast::{ForecastPipeline, ForecastSchema, LagRow};
use crate::health::components::{CLASSIFIER, FORECASTER};
use crate::models::{ClassificationResult, ForecastRequest, ForecastResult, SensorReading};
use chrono::{DateTime, FixedOffset, Local};
use serde::Serialize;
use tracing::debug;

/// Which models are loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelsLoaded {
    pub classification_loaded: bool,
    pub forecast_loaded: bool,
}

/// Forecast schema in effect; the defaults when no forecast bundle is loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastMeta {
    pub sensor_cols: Vec<String>,
    pub n_lags: usize,
    pub horizon_steps: u32,
    pub horizon_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ForecastMeta {
    fn new(schema: &ForecastSchema, version: Option<&str>) -> Self {
        Self {
            sensor_cols: schema.sensor_cols().to_vec(),
            n_lags: schema.n_lags(),
            horizon_steps: schema.horizon_steps(),
            horizon_minutes: schema.horizon_minutes(),
            version: version.map(str::to_string),
        }
    }
}

/// Engine status reported by the health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub models: ModelsLoaded,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification_version: Option<String>,
    pub forecast_meta: ForecastMeta,
}

#[derive(Debug, Default)]
pub struct AquaEngine {
    classification: Option<ClassificationPipeline>,
    forecast: Option<ForecastPipeline>,
}

impl AquaEngine {
    pub fn new(
        classification: Option<ClassificationPipeline>,
        forecast: Option<ForecastPipeline>,
    ) -> Self {
        Self {
            classification,
            forecast,
        }
    }

    pub fn classification(&self) -> Option<&ClassificationPipeline> {
        self.classification.as_ref()
    }

    pub fn forecast_pipeline(&self) -> Option<&ForecastPipeline> {
        self.forecast.as_ref()
    }

    /// Classify one reading and recommend a pump action
    pub fn classify(&self, reading: &SensorReading) -> Result<ClassificationResult, PipelineError> {
        reading.validate()?;
        let pipeline = self
            .classification
            .as_ref()
            .ok_or(PipelineError::ModelNotLoaded(CLASSIFIER))?;
        pipeline.classify(reading)
    }

    /// Forecast anchored at the current local time
    pub fn forecast(&self, request: &ForecastRequest) -> Result<ForecastResult, PipelineError> {
        self.forecast_at(request, Local::now().fixed_offset())
    }

    /// Forecast with an explicit "now" for requests without timestamps
    pub fn forecast_at(
        &self,
        request: &ForecastRequest,
        now: DateTime<FixedOffset>,
    ) -> Result<ForecastResult, PipelineError> {
        let current = current_reading(request)?;
        current.validate()?;
        let pipeline = self
            .forecast
            .as_ref()
            .ok_or(PipelineError::ModelNotLoaded(FORECASTER))?;
        pipeline.forecast(&current, request.history(), now)
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            models: ModelsLoaded {
                classification_loaded: self.classification.is_some(),
                forecast_loaded: self.forecast.is_some(),
            },
            classification_version: self
                .classification
                .as_ref()
                .map(|p| p.version().to_string()),
            forecast_meta: match &self.forecast {
                Some(p) => ForecastMeta::new(p.forecast_schema(), Some(p.version())),
                None => ForecastMeta::new(&ForecastSchema::default(), None),
            },
        }
    }
}

/// Explicit reading, else the last history point in input order
fn current_reading(request: &ForecastRequest) -> Result<SensorReading, PipelineError> {
    if let Some(reading) = request.explicit_reading() {
        return Ok(reading);
    }
    let history = request.history().ok_or_else(|| {
        PipelineError::InsufficientInput(
            "provide ph, turbidity and temperature or a non-empty history".to_string(),
        )
    })?;
    let index = history.len() - 1;
    let last = &history[index];
    let row = LagRow::from_point(last, index)?;
    debug!(row = index, "Using last history point as the current reading");

    let reading = SensorReading::new(row.ph, row.turbidity, row.temperature);
    Ok(match last.timestamp {
        Some(ts) => reading.at(ts),
        None => reading,
    })
}
