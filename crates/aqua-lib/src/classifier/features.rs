//! Feature engineering for water-quality classification
//!
//! Turns one raw (pH, turbidity, temperature) reading into the 19 named
//! features the classifier was trained on. Every feature is a pure function
//! of the reading and the calibration constants.

use crate::models::{CalibrationConstants, SensorReading};
use crate::schema::FeatureSource;

/// Names of every feature the builder produces, in emission order
pub const CLASSIFICATION_FEATURES: [&str; 19] = [
    "temp",
    "turb_cm",
    "pH",
    "ph_centered",
    "ph_dev",
    "temp_centered",
    "temp_dev",
    "clarity_dev",
    "ph_dev_norm",
    "temp_dev_norm",
    "clarity_dev_norm",
    "ph_acidic_flag",
    "ph_alkaline_flag",
    "temp_cold_flag",
    "temp_hot_flag",
    "turb_very_turbid_flag",
    "turb_low_clarity_flag",
    "stress_score",
    "stress_critical_flag",
];

/// pH below this is acidic
pub const PH_ACIDIC_BELOW: f64 = 6.5;

/// pH above this is alkaline
pub const PH_ALKALINE_ABOVE: f64 = 8.5;

/// Allowed temperature band around T_OPT in °C
pub const TEMP_BAND: f64 = 3.0;

/// Stress score above which the critical flag is raised
pub const STRESS_CRITICAL_ABOVE: f64 = 1.5;

const PH_NORM: f64 = 3.0;
const TEMP_NORM: f64 = 10.0;

/// The 19 engineered classification features
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationFeatures {
    pub temp: f64,
    pub turb_cm: f64,
    pub ph: f64,
    pub ph_centered: f64,
    pub ph_dev: f64,
    pub temp_centered: f64,
    pub temp_dev: f64,
    pub clarity_dev: f64,
    pub ph_dev_norm: f64,
    pub temp_dev_norm: f64,
    pub clarity_dev_norm: f64,
    pub ph_acidic_flag: u8,
    pub ph_alkaline_flag: u8,
    pub temp_cold_flag: u8,
    pub temp_hot_flag: u8,
    pub turb_very_turbid_flag: u8,
    pub turb_low_clarity_flag: u8,
    pub stress_score: f64,
    pub stress_critical_flag: u8,
}

impl ClassificationFeatures {
    /// All features as (name, value) pairs in emission order
    pub fn named(&self) -> [(&'static str, f64); 19] {
        [
            ("temp", self.temp),
            ("turb_cm", self.turb_cm),
            ("pH", self.ph),
            ("ph_centered", self.ph_centered),
            ("ph_dev", self.ph_dev),
            ("temp_centered", self.temp_centered),
            ("temp_dev", self.temp_dev),
            ("clarity_dev", self.clarity_dev),
            ("ph_dev_norm", self.ph_dev_norm),
            ("temp_dev_norm", self.temp_dev_norm),
            ("clarity_dev_norm", self.clarity_dev_norm),
            ("ph_acidic_flag", self.ph_acidic_flag.into()),
            ("ph_alkaline_flag", self.ph_alkaline_flag.into()),
            ("temp_cold_flag", self.temp_cold_flag.into()),
            ("temp_hot_flag", self.temp_hot_flag.into()),
            ("turb_very_turbid_flag", self.turb_very_turbid_flag.into()),
            ("turb_low_clarity_flag", self.turb_low_clarity_flag.into()),
            ("stress_score", self.stress_score),
            ("stress_critical_flag", self.stress_critical_flag.into()),
        ]
    }
}

impl FeatureSource for ClassificationFeatures {
    fn feature(&self, name: &str) -> Option<f64> {
        self.named()
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }
}

/// Builds classification features from raw readings
#[derive(Debug, Clone, Copy)]
pub struct ClassificationFeatureBuilder {
    constants: CalibrationConstants,
}

impl ClassificationFeatureBuilder {
    pub fn new(constants: CalibrationConstants) -> Self {
        Self { constants }
    }

    pub fn build(&self, reading: &SensorReading) -> ClassificationFeatures {
        let CalibrationConstants {
            p_opt,
            t_opt,
            clar_ref,
        } = self.constants;
        let ph = reading.ph;
        let temp = reading.water_temp_c;
        let turbidity = reading.turbidity_ntu;

        // Inferred clarity in cm, clamped at zero for very turbid water
        let turb_cm = (clar_ref - turbidity).max(0.0);

        let ph_centered = ph - p_opt;
        let ph_dev = ph_centered.abs();

        let temp_centered = temp - t_opt;
        let temp_dev = temp_centered.abs();

        let clarity_dev = (turb_cm - clar_ref).abs();

        let ph_dev_norm = ph_dev / PH_NORM;
        let temp_dev_norm = temp_dev / TEMP_NORM;
        let clarity_dev_norm = clarity_dev / clar_ref.max(1.0);

        let stress_score = ph_dev_norm + temp_dev_norm + clarity_dev_norm;

        ClassificationFeatures {
            temp,
            turb_cm,
            ph,
            ph_centered,
            ph_dev,
            temp_centered,
            temp_dev,
            clarity_dev,
            ph_dev_norm,
            temp_dev_norm,
            clarity_dev_norm,
            ph_acidic_flag: flag(ph < PH_ACIDIC_BELOW),
            ph_alkaline_flag: flag(ph > PH_ALKALINE_ABOVE),
            temp_cold_flag: flag(temp < t_opt - TEMP_BAND),
            temp_hot_flag: flag(temp > t_opt + TEMP_BAND),
            turb_very_turbid_flag: flag(turbidity > clar_ref),
            turb_low_clarity_flag: flag(turb_cm < clar_ref * 0.5),
            stress_score,
            stress_critical_flag: flag(stress_score > STRESS_CRITICAL_ABOVE),
        }
    }
}

impl Default for ClassificationFeatureBuilder {
    fn default() -> Self {
        Self::new(CalibrationConstants::default())
    }
}

fn flag(condition: bool) -> u8 {
    u8::from(condition)
}
