//! Health tracking for the prediction service
//!
//! Each model pipeline is a component. A bundle that failed to load marks
//! its component unhealthy, which keeps `/readyz` failing until restart.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Unhealthy if any component is; no components is healthy
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .find(|status| *status == ComponentStatus::Unhealthy)
            .unwrap_or(ComponentStatus::Healthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const CLASSIFIER: &str = "classifier";
    pub const FORECASTER: &str = "forecaster";
}

/// Health registry shared by the service and its probes
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Record the outcome of loading a model bundle
    pub async fn record_load<T>(&self, name: &str, outcome: &Result<T, PipelineError>) {
        match outcome {
            Ok(_) => self.set_healthy(name).await,
            Err(e) => self.set_unhealthy(name, format!("{}: {}", e.code(), e)).await,
        }
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        let reason = if !ready {
            Some("Service not yet initialized".to_string())
        } else if health.status == ComponentStatus::Unhealthy {
            let mut failed: Vec<&str> = health
                .components
                .iter()
                .filter(|(_, c)| c.status == ComponentStatus::Unhealthy)
                .map(|(name, _)| name.as_str())
                .collect();
            failed.sort_unstable();
            Some(format!("Model not loaded: {}", failed.join(", ")))
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::components::{CLASSIFIER, FORECASTER};
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_component_registration() {
        let registry = HealthRegistry::new();
        registry.register(CLASSIFIER).await;

        let health = registry.health().await;
        assert_eq!(health.components[CLASSIFIER].status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_one_unhealthy_component_fails_overall() {
        let registry = HealthRegistry::new();
        registry.register(CLASSIFIER).await;
        registry.register(FORECASTER).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);

        registry.set_unhealthy(CLASSIFIER, "bundle missing").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_record_load_failure() {
        let registry = HealthRegistry::new();
        let failed: Result<(), PipelineError> = Err(PipelineError::BundleLoad {
            path: PathBuf::from("models/forecast.json"),
            reason: "No such file or directory".to_string(),
        });
        registry.record_load(CLASSIFIER, &Ok::<_, PipelineError>(())).await;
        registry.record_load(FORECASTER, &failed).await;

        let health = registry.health().await;
        let forecaster = &health.components[FORECASTER];
        assert_eq!(forecaster.status, ComponentStatus::Unhealthy);
        assert!(forecaster
            .message
            .as_deref()
            .unwrap()
            .starts_with("BUNDLE_LOAD_FAILED"));
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let readiness = HealthRegistry::new().readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_readiness_ready_when_set() {
        let registry = HealthRegistry::new();
        registry.register(CLASSIFIER).await;
        registry.set_ready(true).await;

        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        assert!(readiness.reason.is_none());
    }

    #[tokio::test]
    async fn test_readiness_names_failed_models() {
        let registry = HealthRegistry::new();
        registry.register(CLASSIFIER).await;
        registry.set_unhealthy(FORECASTER, "Failed").await;
        registry.set_ready(true).await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Model not loaded: forecaster"));
    }
}
