//! ONNX model backends using tract
//!
//! Models exported from scikit-learn are loaded through tract-onnx and run
//! on a single `[1, n_features]` f32 row. tract plans run through `&self`,
//! so one plan serves concurrent requests without a lock.

use crate::classifier::{LabelModel, ProbabilityModel};
use crate::forecast::RegressionModel;
use anyhow::{Context, Result};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// An optimized ONNX model with a fixed input width
pub struct OnnxModel {
    plan: TractModel,
    n_features: usize,
    n_outputs: usize,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("n_features", &self.n_features)
            .field("n_outputs", &self.n_outputs)
            .finish_non_exhaustive()
    }
}

impl OnnxModel {
    /// Parse and optimize an ONNX model taking `n_features` inputs
    pub fn from_bytes(model_bytes: &[u8], n_features: usize) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?;
        let n_outputs = model.outputs.len();

        let plan = model
            .with_input_fact(0, f32::fact([1, n_features]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;

        Ok(Self {
            plan,
            n_features,
            n_outputs,
        })
    }

    /// Number of graph outputs declared by the model
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// Run the model and return one output flattened to f64
    fn run_output(&self, row: &[f64], output: usize) -> Result<Vec<f64>> {
        if row.len() != self.n_features {
            anyhow::bail!(
                "Feature row has {} values, model expects {}",
                row.len(),
                self.n_features
            );
        }
        let start = Instant::now();

        let data: Vec<f32> = row.iter().map(|v| *v as f32).collect();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, self.n_features), data)
            .context("Failed to shape input tensor")?
            .into();

        let result = self.plan.run(tvec!(input.into()))?;
        let tensor = result
            .get(output)
            .with_context(|| format!("Model has no output {}", output))?;
        let values = tensor
            .cast_to::<f64>()
            .context("Model output is not numeric")?;
        let values: Vec<f64> = values.to_array_view::<f64>()?.iter().copied().collect();

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(values)
    }
}

impl RegressionModel for OnnxModel {
    fn predict(&self, row: &[f64]) -> Result<Vec<f64>> {
        self.run_output(row, 0)
    }
}

/// Classifier reading class probabilities from one model output
#[derive(Debug)]
pub struct OnnxProbabilities {
    model: OnnxModel,
    output: usize,
}

impl OnnxProbabilities {
    pub fn new(model: OnnxModel, output: usize) -> Self {
        Self { model, output }
    }
}

impl ProbabilityModel for OnnxProbabilities {
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        self.model.run_output(row, self.output)
    }
}

/// Classifier reading the predicted label from output 0
#[derive(Debug)]
pub struct OnnxLabel {
    model: OnnxModel,
}

impl OnnxLabel {
    pub fn new(model: OnnxModel) -> Self {
        Self { model }
    }
}

impl LabelModel for OnnxLabel {
    fn predict_label(&self, row: &[f64]) -> Result<i64> {
        let values = self.model.run_output(row, 0)?;
        let label = *values.first().context("Model returned no label")?;
        if label.fract() != 0.0 || !label.is_finite() {
            anyhow::bail!("Model label {} is not an integer class", label);
        }
        Ok(label as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `variable = input + [0.25, 1.0, -0.5]`, one output
    const OFFSET: &[u8] = include_bytes!("../tests/fixtures/offset3.onnx");
    /// `label = argmax(input)`, `probabilities = softmax(input)`
    const ARGMAX_SOFTMAX: &[u8] = include_bytes!("../tests/fixtures/argmax_softmax3.onnx");

    #[test]
    fn test_invalid_bytes_fail_to_load() {
        let err = OnnxModel::from_bytes(b"not an onnx model", 19).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse ONNX model"));
    }

    #[test]
    fn test_regression_reads_output_zero() {
        let model = OnnxModel::from_bytes(OFFSET, 3).unwrap();
        assert_eq!(model.n_outputs(), 1);
        assert_eq!(model.predict(&[7.0, 10.0, 27.0]).unwrap(), vec![7.25, 11.0, 26.5]);
    }

    #[test]
    fn test_row_width_must_match_input_fact() {
        let model = OnnxModel::from_bytes(OFFSET, 3).unwrap();
        let err = model.predict(&[7.0, 10.0]).unwrap_err();
        assert!(err.to_string().contains("model expects 3"));
    }

    #[test]
    fn test_probabilities_from_second_output() {
        let model = OnnxModel::from_bytes(ARGMAX_SOFTMAX, 3).unwrap();
        assert_eq!(model.n_outputs(), 2);

        let proba = OnnxProbabilities::new(model, 1)
            .predict_proba(&[0.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(proba.len(), 3);
        for p in proba {
            assert!((p - 1.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_integer_label_output() {
        let model = OnnxModel::from_bytes(ARGMAX_SOFTMAX, 3).unwrap();
        let label = OnnxLabel::new(model).predict_label(&[0.2, 5.0, 1.0]).unwrap();
        assert_eq!(label, 1);
    }

    #[test]
    fn test_fractional_label_is_rejected() {
        let label = OnnxLabel::new(OnnxModel::from_bytes(OFFSET, 3).unwrap());
        assert_eq!(label.predict_label(&[1.75, 0.0, 0.0]).unwrap(), 2);

        let err = label.predict_label(&[7.5, 0.0, 0.0]).unwrap_err();
        assert!(err.to_string().contains("7.75 is not an integer class"));
    }
}
