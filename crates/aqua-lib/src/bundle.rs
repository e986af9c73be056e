//! Model bundle loading
//!
//! A bundle is a JSON manifest next to an ONNX file. The manifest carries the
//! feature schema and pipeline metadata; the model path is resolved relative
//! to the manifest. Schemas are validated before the model bytes are read so
//! a contract mismatch never costs a model parse.

use crate::classifier::{ClassificationPipeline, ClassifierModel, CLASSIFICATION_FEATURES};
use crate::error::PipelineError;
use crate::forecast::{
    ForecastPipeline, ForecastSchema, DEFAULT_HORIZON_STEPS, DEFAULT_N_LAGS, DEFAULT_SENSOR_COLS,
};
use crate::models::CalibrationConstants;
use crate::onnx::{OnnxLabel, OnnxModel, OnnxProbabilities};
use crate::schema::FeatureSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Model file reference shared by both manifest kinds
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSource {
    /// ONNX file, relative to the manifest
    pub model: PathBuf,
    /// Expected hex SHA-256 of the model file
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// How the classifier's prediction is read from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierOutput {
    Probabilities,
    Label,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationManifest {
    #[serde(flatten)]
    pub source: ModelSource,
    pub feature_cols: Vec<String>,
    #[serde(rename = "P_OPT", default)]
    pub p_opt: Option<f64>,
    #[serde(rename = "T_OPT", default)]
    pub t_opt: Option<f64>,
    #[serde(rename = "CLAR_REF", default)]
    pub clar_ref: Option<f64>,
    #[serde(default)]
    pub output: Option<ClassifierOutput>,
}

impl ClassificationManifest {
    /// Calibration constants, falling back to the defaults per field
    pub fn constants(&self) -> CalibrationConstants {
        let defaults = CalibrationConstants::default();
        CalibrationConstants {
            p_opt: self.p_opt.unwrap_or(defaults.p_opt),
            t_opt: self.t_opt.unwrap_or(defaults.t_opt),
            clar_ref: self.clar_ref.unwrap_or(defaults.clar_ref),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastManifest {
    #[serde(flatten)]
    pub source: ModelSource,
    pub feature_cols: Vec<String>,
    #[serde(default)]
    pub sensor_cols: Option<Vec<String>>,
    #[serde(default)]
    pub n_lags: Option<usize>,
    #[serde(default)]
    pub horizon: Option<u32>,
}

impl ForecastManifest {
    pub fn forecast_schema(&self) -> Result<ForecastSchema, PipelineError> {
        let sensor_cols = self
            .sensor_cols
            .clone()
            .unwrap_or_else(|| DEFAULT_SENSOR_COLS.iter().map(|s| s.to_string()).collect());
        ForecastSchema::new(
            sensor_cols,
            self.n_lags.unwrap_or(DEFAULT_N_LAGS),
            self.horizon.unwrap_or(DEFAULT_HORIZON_STEPS),
        )
    }
}

/// Compute the hex SHA-256 of model bytes
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn read_manifest<T: DeserializeOwned>(path: &Path) -> Result<T, PipelineError> {
    let raw = fs::read_to_string(path).map_err(|e| PipelineError::bundle_load(path, e))?;
    serde_json::from_str(&raw)
        .map_err(|e| PipelineError::bundle_load(path, format!("invalid manifest: {}", e)))
}

/// Read the model file, verify its checksum and parse it with tract
fn load_model(
    manifest_path: &Path,
    source: &ModelSource,
    n_features: usize,
) -> Result<(OnnxModel, String), PipelineError> {
    let model_path = manifest_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&source.model);
    let bytes = fs::read(&model_path).map_err(|e| PipelineError::bundle_load(&model_path, e))?;

    let checksum = compute_checksum(&bytes);
    if let Some(expected) = &source.sha256 {
        if !expected.eq_ignore_ascii_case(&checksum) {
            return Err(PipelineError::bundle_load(
                &model_path,
                format!("checksum mismatch: expected {}, got {}", expected, checksum),
            ));
        }
        debug!(path = %model_path.display(), checksum = %checksum, "Model checksum validated");
    }

    let model = OnnxModel::from_bytes(&bytes, n_features)
        .map_err(|e| PipelineError::bundle_load(&model_path, format!("{:#}", e)))?;

    let version = source
        .version
        .clone()
        .unwrap_or_else(|| format!("sha256:{}", &checksum[..12]));

    info!(
        path = %model_path.display(),
        size = bytes.len(),
        n_features,
        n_outputs = model.n_outputs(),
        version = %version,
        "Loaded ONNX model"
    );
    Ok((model, version))
}

/// Pick the classifier variant for a loaded model
///
/// An explicit manifest `output` wins. Otherwise a model with two or more
/// outputs is read as label + probabilities and uses output 1.
fn classifier_model(model: OnnxModel, output: Option<ClassifierOutput>) -> ClassifierModel {
    let multi_output = model.n_outputs() >= 2;
    let output = output.unwrap_or(if multi_output {
        ClassifierOutput::Probabilities
    } else {
        ClassifierOutput::Label
    });
    match output {
        ClassifierOutput::Probabilities => {
            let index = if multi_output { 1 } else { 0 };
            ClassifierModel::Probabilistic(Box::new(OnnxProbabilities::new(model, index)))
        }
        ClassifierOutput::Label => ClassifierModel::Point(Box::new(OnnxLabel::new(model))),
    }
}

/// Load the water-quality classification bundle
pub fn load_classification_bundle(path: &Path) -> Result<ClassificationPipeline, PipelineError> {
    let manifest: ClassificationManifest = read_manifest(path)?;
    let schema = FeatureSchema::new(manifest.feature_cols.iter())?;
    schema.ensure_producible(CLASSIFICATION_FEATURES, "classification")?;

    let (model, version) = load_model(path, &manifest.source, schema.len())?;
    let model = classifier_model(model, manifest.output);
    let pipeline = ClassificationPipeline::new(schema, manifest.constants(), model)?
        .with_version(version);

    info!(
        manifest = %path.display(),
        features = pipeline.schema().len(),
        classifier = pipeline.classifier_kind(),
        "Classification bundle ready"
    );
    Ok(pipeline)
}

/// Load the pond forecast bundle
pub fn load_forecast_bundle(path: &Path) -> Result<ForecastPipeline, PipelineError> {
    let manifest: ForecastManifest = read_manifest(path)?;
    let schema = FeatureSchema::new(manifest.feature_cols.iter())?;
    let forecast_schema = manifest.forecast_schema()?;
    forecast_schema.ensure_covers(&schema)?;

    let (model, version) = load_model(path, &manifest.source, schema.len())?;
    let pipeline =
        ForecastPipeline::new(schema, forecast_schema, Box::new(model))?.with_version(version);

    info!(
        manifest = %path.display(),
        features = pipeline.model_schema().len(),
        n_lags = pipeline.forecast_schema().n_lags(),
        horizon_minutes = pipeline.forecast_schema().horizon_minutes(),
        "Forecast bundle ready"
    );
    Ok(pipeline)
}
