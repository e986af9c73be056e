//! Forecaster adapter over an external multi-output regressor

use super::features::ForecastSchema;
use crate::error::PipelineError;
use crate::models::{ForecastResult, Sensor};
use anyhow::Result;
use tracing::debug;

/// Model returning one prediction per sensor column
pub trait RegressionModel: Send + Sync {
    fn predict(&self, row: &[f64]) -> Result<Vec<f64>>;
}

/// Pond forecaster wrapping the loaded regressor
pub struct PondForecaster {
    model: Box<dyn RegressionModel>,
}

impl std::fmt::Debug for PondForecaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PondForecaster").finish_non_exhaustive()
    }
}

impl PondForecaster {
    pub fn new(model: Box<dyn RegressionModel>) -> Self {
        Self { model }
    }

    /// Predict the next values; output i belongs to `sensor_cols[i]`
    pub fn forecast(
        &self,
        row: &[f64],
        schema: &ForecastSchema,
    ) -> Result<ForecastResult, PipelineError> {
        let outputs = self.model.predict(row).map_err(PipelineError::inference)?;
        let sensors = schema.sensors();
        if outputs.len() < sensors.len() {
            return Err(PipelineError::Inference(format!(
                "forecast model returned {} values, expected {}",
                outputs.len(),
                sensors.len()
            )));
        }

        let mut result = ForecastResult {
            horizon_minutes: schema.horizon_minutes(),
            ph: 0.0,
            turbidity: 0.0,
            temperature: 0.0,
        };
        for (sensor, value) in sensors.iter().zip(outputs) {
            match sensor {
                Sensor::Ph => result.ph = value,
                Sensor::Turbidity => result.turbidity = value,
                Sensor::Temperature => result.temperature = value,
            }
        }

        debug!(
            ph = result.ph,
            turbidity = result.turbidity,
            temperature = result.temperature,
            horizon_minutes = result.horizon_minutes,
            "Forecast completed"
        );
        Ok(result)
    }
}
