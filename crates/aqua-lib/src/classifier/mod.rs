//! Water-quality classification pipeline

mod features;
mod inference;
mod policy;

pub use features::{
    ClassificationFeatureBuilder, ClassificationFeatures, CLASSIFICATION_FEATURES,
    PH_ACIDIC_BELOW, PH_ALKALINE_ABOVE, STRESS_CRITICAL_ABOVE, TEMP_BAND,
};
pub use inference::{
    ClassDecision, ClassifierModel, LabelModel, ProbabilityModel, WaterQualityClassifier,
};
pub use policy::{
    PolicyConfig, RecommendationPolicy, BASE_DURATION_SECS, MAX_DURATION_SECS,
    MIN_DURATION_SECS, STRESS_CAP,
};

use crate::error::PipelineError;
use crate::models::{CalibrationConstants, ClassificationResult, QualityLabel, SensorReading};
use crate::schema::FeatureSchema;

/// Feature builder, classifier and policy bound to one loaded model
#[derive(Debug)]
pub struct ClassificationPipeline {
    schema: FeatureSchema,
    builder: ClassificationFeatureBuilder,
    classifier: WaterQualityClassifier,
    policy: RecommendationPolicy,
    version: String,
}

impl ClassificationPipeline {
    /// Bind a model to its schema, failing if the schema asks for unknown features
    pub fn new(
        schema: FeatureSchema,
        constants: CalibrationConstants,
        model: ClassifierModel,
    ) -> Result<Self, PipelineError> {
        schema.ensure_producible(CLASSIFICATION_FEATURES, "classification")?;
        Ok(Self {
            schema,
            builder: ClassificationFeatureBuilder::new(constants),
            classifier: WaterQualityClassifier::new(model),
            policy: RecommendationPolicy::new(),
            version: "unversioned".to_string(),
        })
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn classifier_kind(&self) -> &'static str {
        self.classifier.kind()
    }

    /// Classify a reading and derive the pump recommendation
    pub fn classify(&self, reading: &SensorReading) -> Result<ClassificationResult, PipelineError> {
        let features = self.builder.build(reading);
        let row = self.schema.assemble(&features)?;
        let decision = self.classifier.classify(&row)?;

        let label = QualityLabel::from_class_index(decision.class_index);
        let recommendation = self.policy.recommend(label, features.stress_score);

        Ok(ClassificationResult {
            label,
            class_index: decision.class_index,
            confidence: decision.confidence,
            stress_score: features.stress_score,
            recommendation,
        })
    }
}
