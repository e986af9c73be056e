//! Classifier adapter over an external model
//!
//! A loaded classifier either exposes class probabilities or only a direct
//! label. The capability is decided once when the bundle is loaded.

use crate::error::PipelineError;
use anyhow::Result;
use tracing::debug;

/// Model exposing a probability per class
pub trait ProbabilityModel: Send + Sync {
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>>;
}

/// Model exposing only the predicted class
pub trait LabelModel: Send + Sync {
    fn predict_label(&self, row: &[f64]) -> Result<i64>;
}

/// Classifier capability selected at load time
pub enum ClassifierModel {
    Probabilistic(Box<dyn ProbabilityModel>),
    Point(Box<dyn LabelModel>),
}

impl ClassifierModel {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifierModel::Probabilistic(_) => "probabilistic",
            ClassifierModel::Point(_) => "point",
        }
    }
}

impl std::fmt::Debug for ClassifierModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ClassifierModel").field(&self.kind()).finish()
    }
}

/// Raw classifier decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassDecision {
    pub class_index: i64,
    pub confidence: f64,
}

/// Water-quality classifier wrapping the loaded model
#[derive(Debug)]
pub struct WaterQualityClassifier {
    model: ClassifierModel,
}

impl WaterQualityClassifier {
    pub fn new(model: ClassifierModel) -> Self {
        Self { model }
    }

    pub fn kind(&self) -> &'static str {
        self.model.kind()
    }

    /// Classify a feature vector already ordered by the model schema
    pub fn classify(&self, row: &[f64]) -> Result<ClassDecision, PipelineError> {
        match &self.model {
            ClassifierModel::Probabilistic(model) => {
                let proba = model.predict_proba(row).map_err(PipelineError::inference)?;
                let (index, p) = argmax(&proba).ok_or_else(|| {
                    PipelineError::Inference("model returned no class probabilities".to_string())
                })?;
                debug!(class_index = index, confidence = p, "Probabilistic classification");
                Ok(ClassDecision {
                    class_index: index as i64,
                    confidence: p.clamp(0.0, 1.0),
                })
            }
            ClassifierModel::Point(model) => {
                let class_index = model.predict_label(row).map_err(PipelineError::inference)?;
                debug!(class_index, "Point classification");
                Ok(ClassDecision {
                    class_index,
                    confidence: 1.0,
                })
            }
        }
    }
}

/// Index and value of the first maximum, ignoring NaN entries
fn argmax(values: &[f64]) -> Option<(usize, f64)> {
    values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best, (i, v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
}
