//! Core data models for the water-quality service

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::PipelineError;

/// One raw reading from the pond sensors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub ph: f64,
    pub turbidity_ntu: f64,
    pub water_temp_c: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl SensorReading {
    pub fn new(ph: f64, turbidity_ntu: f64, water_temp_c: f64) -> Self {
        Self {
            ph,
            turbidity_ntu,
            water_temp_c,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Reject values no sensor can produce
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, value) in [
            ("ph", self.ph),
            ("turbidity", self.turbidity_ntu),
            ("temperature", self.water_temp_c),
        ] {
            if !value.is_finite() {
                return Err(PipelineError::InvalidInput(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
        }
        if self.turbidity_ntu < 0.0 {
            return Err(PipelineError::InvalidInput(format!(
                "turbidity must be >= 0, got {}",
                self.turbidity_ntu
            )));
        }
        Ok(())
    }

    /// Value of a physical sensor
    pub fn value(&self, sensor: Sensor) -> f64 {
        match sensor {
            Sensor::Ph => self.ph,
            Sensor::Turbidity => self.turbidity_ntu,
            Sensor::Temperature => self.water_temp_c,
        }
    }
}

/// Physical sensors tracked by both models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensor {
    Ph,
    Turbidity,
    Temperature,
}

impl Sensor {
    pub const ALL: [Sensor; 3] = [Sensor::Ph, Sensor::Turbidity, Sensor::Temperature];
}

/// Calibration constants baked into the classification bundle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConstants {
    /// Optimal pH
    #[serde(rename = "P_OPT")]
    pub p_opt: f64,
    /// Optimal water temperature in °C
    #[serde(rename = "T_OPT")]
    pub t_opt: f64,
    /// Reference clarity, also the turbidity threshold in NTU
    #[serde(rename = "CLAR_REF")]
    pub clar_ref: f64,
}

impl Default for CalibrationConstants {
    fn default() -> Self {
        Self {
            p_opt: 7.5,
            t_opt: 27.0,
            clar_ref: 40.0,
        }
    }
}

/// Water quality class predicted by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityLabel {
    Excellent,
    Good,
    Poor,
    /// Class index outside the known label map
    Unknown(i64),
}

impl QualityLabel {
    pub fn from_class_index(index: i64) -> Self {
        match index {
            0 => QualityLabel::Excellent,
            1 => QualityLabel::Good,
            2 => QualityLabel::Poor,
            other => QualityLabel::Unknown(other),
        }
    }

    pub fn is_poor(&self) -> bool {
        matches!(self, QualityLabel::Poor)
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityLabel::Excellent => f.write_str("EXCELLENT"),
            QualityLabel::Good => f.write_str("GOOD"),
            QualityLabel::Poor => f.write_str("POOR"),
            QualityLabel::Unknown(index) => write!(f, "{}", index),
        }
    }
}

impl Serialize for QualityLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Pump command issued by the recommendation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PumpAction {
    PumpOn,
    PumpOff,
}

impl PumpAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PumpAction::PumpOn => "PUMP_ON",
            PumpAction::PumpOff => "PUMP_OFF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub action: PumpAction,
    pub duration_seconds: u32,
}

/// Classification output with the derived pump recommendation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: QualityLabel,
    pub class_index: i64,
    pub confidence: f64,
    pub stress_score: f64,
    pub recommendation: Recommendation,
}

/// Predicted sensor values one horizon ahead
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastResult {
    pub horizon_minutes: u32,
    pub ph: f64,
    pub turbidity: f64,
    pub temperature: f64,
}

/// A historical sensor row as supplied by the caller
///
/// Sensor columns are kept by name so that short-form and canonical names
/// can both be resolved; unrelated columns are carried along and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<FixedOffset>>,
    #[serde(flatten)]
    pub columns: BTreeMap<String, serde_json::Value>,
}

impl HistoryPoint {
    pub fn new(timestamp: Option<DateTime<FixedOffset>>) -> Self {
        Self {
            timestamp,
            columns: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: f64) -> Self {
        self.columns.insert(column.to_string(), serde_json::Value::from(value));
        self
    }

    /// Build a row using the short-form column names of the public API
    pub fn from_reading(reading: &SensorReading) -> Self {
        Self::new(reading.timestamp)
            .with("ph", reading.ph)
            .with("turbidity", reading.turbidity_ntu)
            .with("temperature", reading.water_temp_c)
    }

    /// Numeric value of a column, if present and a number
    pub fn number(&self, column: &str) -> Option<f64> {
        self.columns.get(column).and_then(serde_json::Value::as_f64)
    }
}

/// Forecast input: an explicit reading, a history, or both
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    #[serde(default)]
    pub ph: Option<f64>,
    #[serde(default)]
    pub turbidity: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub history: Option<Vec<HistoryPoint>>,
}

impl ForecastRequest {
    pub fn from_reading(reading: &SensorReading) -> Self {
        Self {
            ph: Some(reading.ph),
            turbidity: Some(reading.turbidity_ntu),
            temperature: Some(reading.water_temp_c),
            history: None,
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryPoint>) -> Self {
        self.history = Some(history);
        self
    }

    /// History rows, treating an empty list like no history
    pub fn history(&self) -> Option<&[HistoryPoint]> {
        self.history.as_deref().filter(|h| !h.is_empty())
    }

    /// Explicit reading if all three values were supplied
    pub fn explicit_reading(&self) -> Option<SensorReading> {
        match (self.ph, self.turbidity, self.temperature) {
            (Some(ph), Some(turbidity), Some(temperature)) => {
                Some(SensorReading::new(ph, turbidity, temperature))
            }
            _ => None,
        }
    }
}
