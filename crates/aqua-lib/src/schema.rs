//! Ordered feature schemas shared by both pipelines
//!
//! A schema is the list of column names a model was trained on. Builders
//! emit features by name; the schema selects and orders them into the
//! exact vector the model expects.

use crate::error::PipelineError;
use std::sync::Arc;

/// Source of named feature values
pub trait FeatureSource {
    /// Value of a named feature, or None if this source cannot produce it
    fn feature(&self, name: &str) -> Option<f64>;
}

/// Immutable ordered list of feature names expected by a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Arc<[String]>,
}

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(PipelineError::FatalConfiguration(
                "feature schema is empty".to_string(),
            ));
        }
        Ok(Self {
            names: names.into(),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Check that every schema column is producible by a builder
    pub fn ensure_producible<'a, I>(&self, producible: I, pipeline: &str) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let producible: Vec<&str> = producible.into_iter().collect();
        let missing: Vec<&str> = self
            .names
            .iter()
            .map(String::as_str)
            .filter(|name| !producible.contains(name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::FatalConfiguration(format!(
                "{} feature schema references columns that cannot be produced: {}",
                pipeline,
                missing.join(", ")
            )))
        }
    }

    /// Assemble the model input vector in schema order
    pub fn assemble<S: FeatureSource>(&self, source: &S) -> Result<Vec<f64>, PipelineError> {
        self.names
            .iter()
            .map(|name| {
                source.feature(name).ok_or_else(|| {
                    PipelineError::FatalConfiguration(format!(
                        "feature '{}' required by the model schema is not produced",
                        name
                    ))
                })
            })
            .collect()
    }
}
