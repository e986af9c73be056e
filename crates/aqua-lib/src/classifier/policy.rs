//! Pump recommendation policy
//!
//! Maps the classifier label and stress score to a pump action. Run time
//! grows with stress but is bounded to protect the equipment.

use crate::models::{PumpAction, QualityLabel, Recommendation};

/// Base pump run time in seconds
pub const BASE_DURATION_SECS: f64 = 30.0;

/// Stress contribution saturates at this score
pub const STRESS_CAP: f64 = 3.0;

/// Shortest pump run in seconds
pub const MIN_DURATION_SECS: u32 = 30;

/// Longest pump run in seconds
pub const MAX_DURATION_SECS: u32 = 300;

/// Configuration for the recommendation policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyConfig {
    /// Run time at zero stress
    pub base_duration_secs: f64,
    /// Stress score above which the run time stops growing
    pub stress_cap: f64,
    /// Lower bound on the pump run time
    pub min_duration_secs: u32,
    /// Upper bound on the pump run time
    pub max_duration_secs: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            base_duration_secs: BASE_DURATION_SECS,
            stress_cap: STRESS_CAP,
            min_duration_secs: MIN_DURATION_SECS,
            max_duration_secs: MAX_DURATION_SECS,
        }
    }
}

/// Turns a classification into a pump recommendation
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationPolicy {
    config: PolicyConfig,
}

impl RecommendationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn recommend(&self, label: QualityLabel, stress_score: f64) -> Recommendation {
        if !label.is_poor() {
            return Recommendation {
                action: PumpAction::PumpOff,
                duration_seconds: 0,
            };
        }

        Recommendation {
            action: PumpAction::PumpOn,
            duration_seconds: self.pump_duration(stress_score),
        }
    }

    /// Run time in whole seconds for a poor-quality reading
    fn pump_duration(&self, stress_score: f64) -> u32 {
        let stress = stress_score.max(0.0).min(self.config.stress_cap);
        // Float-to-int `as` truncates toward zero and saturates
        let seconds = (self.config.base_duration_secs * (1.0 + stress)) as u32;
        seconds.clamp(self.config.min_duration_secs, self.config.max_duration_secs)
    }
}
