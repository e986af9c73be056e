//! Short-horizon pond forecasting pipeline

mod features;
mod history;
mod inference;

pub use features::{
    lag_feature, ForecastFeatureBuilder, ForecastFeatures, ForecastSchema, DAY_OF_WEEK_FEATURE,
    DEFAULT_HORIZON_STEPS, DEFAULT_N_LAGS, DEFAULT_SENSOR_COLS, HOUR_FEATURE, STEP_MINUTES,
};
pub use history::{
    accepted_names, resolve_sensor, HistoryWindow, LagBuffer, LagRow, SENSOR_ALIASES,
};
pub use inference::{PondForecaster, RegressionModel};

use crate::error::PipelineError;
use crate::models::{ForecastResult, HistoryPoint, SensorReading};
use crate::schema::FeatureSchema;
use chrono::{DateTime, FixedOffset};

/// History window, feature builder and forecaster bound to one loaded model
#[derive(Debug)]
pub struct ForecastPipeline {
    model_schema: FeatureSchema,
    window: HistoryWindow,
    builder: ForecastFeatureBuilder,
    forecaster: PondForecaster,
    version: String,
}

impl ForecastPipeline {
    /// Bind a regressor to its schemas, failing if the model asks for unknown features
    pub fn new(
        model_schema: FeatureSchema,
        forecast_schema: ForecastSchema,
        model: Box<dyn RegressionModel>,
    ) -> Result<Self, PipelineError> {
        forecast_schema.ensure_covers(&model_schema)?;
        Ok(Self {
            model_schema,
            window: HistoryWindow::new(forecast_schema.n_lags()),
            builder: ForecastFeatureBuilder::new(forecast_schema),
            forecaster: PondForecaster::new(model),
            version: "unversioned".to_string(),
        })
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn model_schema(&self) -> &FeatureSchema {
        &self.model_schema
    }

    pub fn forecast_schema(&self) -> &ForecastSchema {
        self.builder.schema()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Assemble the model input row for a request
    pub fn features(
        &self,
        current: &SensorReading,
        history: Option<&[HistoryPoint]>,
        now: DateTime<FixedOffset>,
    ) -> Result<Vec<f64>, PipelineError> {
        let buffer = self.window.build(history, current, now)?;
        let features = self.builder.build(&buffer);
        self.model_schema.assemble(&features)
    }

    /// Forecast the next horizon from the current reading and optional history
    pub fn forecast(
        &self,
        current: &SensorReading,
        history: Option<&[HistoryPoint]>,
        now: DateTime<FixedOffset>,
    ) -> Result<ForecastResult, PipelineError> {
        let row = self.features(current, history, now)?;
        self.forecaster.forecast(&row, self.builder.schema())
    }
}
