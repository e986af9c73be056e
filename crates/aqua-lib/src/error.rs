//! Error taxonomy shared by both prediction pipelines

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading bundles, building features or running inference
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// Model contract does not match what the feature builders produce
    #[error("Fatal configuration error: {0}")]
    FatalConfiguration(String),

    /// Bundle manifest or model file could not be loaded
    #[error("Failed to load model bundle {path:?}: {reason}")]
    BundleLoad { path: PathBuf, reason: String },

    /// Neither a full sensor reading nor a history point was supplied
    #[error("Insufficient input: {0}")]
    InsufficientInput(String),

    /// A history row has no usable value for a required sensor column
    #[error("History row {row} has no value for column '{column}' (accepted names: {accepted})")]
    UnresolvableColumn {
        row: usize,
        column: String,
        accepted: String,
    },

    /// Inference attempted without a successfully loaded model
    #[error("Model '{0}' is not loaded")]
    ModelNotLoaded(&'static str),

    /// Sensor values outside their physical domain
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The model backend failed or returned an unusable output
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl PipelineError {
    /// Machine-readable error code reported at the request boundary
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::FatalConfiguration(_) => "FATAL_CONFIGURATION",
            PipelineError::BundleLoad { .. } => "BUNDLE_LOAD_FAILED",
            PipelineError::InsufficientInput(_) => "INSUFFICIENT_INPUT",
            PipelineError::UnresolvableColumn { .. } => "UNRESOLVABLE_COLUMN",
            PipelineError::ModelNotLoaded(_) => "MODEL_NOT_LOADED",
            PipelineError::InvalidInput(_) => "INVALID_INPUT",
            PipelineError::Inference(_) => "INFERENCE_FAILED",
        }
    }

    /// Returns true if the error was caused by the request rather than the deployment
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InsufficientInput(_)
                | PipelineError::UnresolvableColumn { .. }
                | PipelineError::InvalidInput(_)
        )
    }

    pub(crate) fn bundle_load(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        PipelineError::BundleLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn inference(err: anyhow::Error) -> Self {
        PipelineError::Inference(format!("{:#}", err))
    }
}
