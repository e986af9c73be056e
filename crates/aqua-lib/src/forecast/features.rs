//! Lagged feature construction for the forecaster
//!
//! Emits `{sensor}_lag{k}` for every sensor column and lag, counting back
//! from the anchor, plus calendar context of the anchor instant.

use super::history::{resolve_sensor, LagBuffer};
use crate::error::PipelineError;
use crate::models::Sensor;
use crate::schema::FeatureSchema;
use chrono::{Datelike, Timelike};
use std::collections::BTreeMap;

/// Default sensor columns of the forecast model
pub const DEFAULT_SENSOR_COLS: [&str; 3] = ["water_pH", "turbidity_ntu", "water_temp"];

/// Default number of lags per sensor
pub const DEFAULT_N_LAGS: usize = 6;

/// Default forecast horizon in steps
pub const DEFAULT_HORIZON_STEPS: u32 = 1;

/// Length of one forecast step in minutes
pub const STEP_MINUTES: u32 = 30;

/// Calendar feature names
pub const HOUR_FEATURE: &str = "hour";
pub const DAY_OF_WEEK_FEATURE: &str = "dayofweek";

/// Forecast model metadata fixed at load time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastSchema {
    sensor_cols: Vec<String>,
    sensors: [Sensor; 3],
    n_lags: usize,
    horizon_steps: u32,
    horizon_minutes: u32,
}

impl ForecastSchema {
    pub fn new(
        sensor_cols: Vec<String>,
        n_lags: usize,
        horizon_steps: u32,
    ) -> Result<Self, PipelineError> {
        if n_lags == 0 {
            return Err(PipelineError::FatalConfiguration(
                "forecast n_lags must be at least 1".to_string(),
            ));
        }
        if horizon_steps == 0 {
            return Err(PipelineError::FatalConfiguration(
                "forecast horizon must be at least 1 step".to_string(),
            ));
        }
        let horizon_minutes = horizon_steps.checked_mul(STEP_MINUTES).ok_or_else(|| {
            PipelineError::FatalConfiguration(format!(
                "forecast horizon of {} steps is too large",
                horizon_steps
            ))
        })?;
        if sensor_cols.len() != 3 {
            return Err(PipelineError::FatalConfiguration(format!(
                "forecast expects 3 sensor columns, got {}",
                sensor_cols.len()
            )));
        }

        let mut sensors = [Sensor::Ph; 3];
        for (slot, col) in sensors.iter_mut().zip(&sensor_cols) {
            *slot = resolve_sensor(col).ok_or_else(|| {
                PipelineError::FatalConfiguration(format!(
                    "forecast sensor column '{}' does not match any known sensor",
                    col
                ))
            })?;
        }
        if Sensor::ALL.iter().any(|s| !sensors.contains(s)) {
            return Err(PipelineError::FatalConfiguration(format!(
                "forecast sensor columns must cover pH, turbidity and temperature: {}",
                sensor_cols.join(", ")
            )));
        }

        Ok(Self {
            sensor_cols,
            sensors,
            n_lags,
            horizon_steps,
            horizon_minutes,
        })
    }

    pub fn sensor_cols(&self) -> &[String] {
        &self.sensor_cols
    }

    /// Physical sensor behind each sensor column, in column order
    pub fn sensors(&self) -> &[Sensor; 3] {
        &self.sensors
    }

    pub fn n_lags(&self) -> usize {
        self.n_lags
    }

    pub fn horizon_steps(&self) -> u32 {
        self.horizon_steps
    }

    pub fn horizon_minutes(&self) -> u32 {
        self.horizon_minutes
    }

    /// Every feature name the builder can produce for this schema
    pub fn producible_features(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .sensor_cols
            .iter()
            .flat_map(|col| (1..=self.n_lags).map(move |lag| lag_feature(col, lag)))
            .collect();
        names.push(HOUR_FEATURE.to_string());
        names.push(DAY_OF_WEEK_FEATURE.to_string());
        names
    }

    /// Check a model schema against what this forecast schema produces
    pub fn ensure_covers(&self, model_schema: &FeatureSchema) -> Result<(), PipelineError> {
        let producible = self.producible_features();
        model_schema.ensure_producible(producible.iter().map(String::as_str), "forecast")
    }
}

impl Default for ForecastSchema {
    fn default() -> Self {
        Self {
            sensor_cols: DEFAULT_SENSOR_COLS.iter().map(|s| s.to_string()).collect(),
            sensors: Sensor::ALL,
            n_lags: DEFAULT_N_LAGS,
            horizon_steps: DEFAULT_HORIZON_STEPS,
            horizon_minutes: DEFAULT_HORIZON_STEPS * STEP_MINUTES,
        }
    }
}

/// Name of a lag feature, e.g. `water_pH_lag1`
pub fn lag_feature(sensor_col: &str, lag: usize) -> String {
    format!("{}_lag{}", sensor_col, lag)
}

/// Named forecast features for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastFeatures {
    values: BTreeMap<String, f64>,
}

impl ForecastFeatures {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl crate::schema::FeatureSource for ForecastFeatures {
    fn feature(&self, name: &str) -> Option<f64> {
        self.get(name)
    }
}

/// Builds lag and calendar features from a lag buffer
#[derive(Debug, Clone)]
pub struct ForecastFeatureBuilder {
    schema: ForecastSchema,
}

impl ForecastFeatureBuilder {
    pub fn new(schema: ForecastSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &ForecastSchema {
        &self.schema
    }

    pub fn build(&self, buffer: &LagBuffer) -> ForecastFeatures {
        let mut values = BTreeMap::new();

        for (col, sensor) in self.schema.sensor_cols.iter().zip(self.schema.sensors) {
            for lag in 1..=self.schema.n_lags {
                if let Some(row) = buffer.lag(lag) {
                    values.insert(lag_feature(col, lag), row.get(sensor));
                }
            }
        }

        let anchor = buffer.anchor();
        values.insert(HOUR_FEATURE.to_string(), f64::from(anchor.hour()));
        values.insert(
            DAY_OF_WEEK_FEATURE.to_string(),
            f64::from(anchor.weekday().num_days_from_monday()),
        );

        ForecastFeatures { values }
    }
}
