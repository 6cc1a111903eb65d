//! MLflow model registry client
//!
//! Resolves "the latest version of a registered model in a stage" and hands
//! back a classifier bound to the scoring server that serves it.

use crate::config::RegistryConfig;
use crate::errors::{Result, ServiceError};
use crate::models::classifier::RemoteClassifier;
use crate::models::types::{
    LatestVersionsResponse, LoadedModel, ModelMetadata, ModelVersion, RegistryErrorBody,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Source of production models
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Resolve and load the current model for `name` in `stage`
    async fn load_production(&self, name: &str, stage: &str) -> Result<LoadedModel>;
}

/// HTTP client for an MLflow tracking server and its scoring server
pub struct MlflowRegistry {
    client: Client,
    tracking_uri: String,
    serving_url: String,
}

impl MlflowRegistry {
    /// Create a registry client
    ///
    /// # Arguments
    /// * `tracking_uri` - Base URL of the tracking server (e.g., http://mlflow:5000)
    /// * `serving_url` - Base URL of the scoring server for the staged model
    /// * `timeout` - Per-request timeout
    pub fn new(tracking_uri: &str, serving_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ServiceError::HttpError)?;

        Ok(Self {
            client,
            tracking_uri: tracking_uri.trim_end_matches('/').to_string(),
            serving_url: serving_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a registry client from configuration
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        Self::new(
            &config.tracking_uri,
            &config.serving_url,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn tracking_uri(&self) -> &str {
        &self.tracking_uri
    }

    pub fn serving_url(&self) -> &str {
        &self.serving_url
    }

    /// Latest version of `name` in `stage`
    ///
    /// Calls GET /api/2.0/mlflow/registered-models/get-latest-versions
    pub async fn latest_version(&self, name: &str, stage: &str) -> Result<ModelVersion> {
        let url = format!(
            "{}/api/2.0/mlflow/registered-models/get-latest-versions",
            self.tracking_uri
        );

        let response = self
            .client
            .get(&url)
            .query(&[("name", name), ("stages", stage)])
            .send()
            .await
            .map_err(|e| ServiceError::ModelLoadFailed(format!("Failed to connect to registry: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response
                .json::<RegistryErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message.or(body.error_code))
                .unwrap_or_else(|| "no details".to_string());
            return Err(ServiceError::ModelLoadFailed(format!(
                "Registry error {} for model '{}': {}",
                status, name, detail
            )));
        }

        let versions: LatestVersionsResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ModelLoadFailed(format!("Failed to parse registry response: {}", e)))?;

        select_version(versions.model_versions, name, stage)
    }

    /// Check that the scoring server answers
    ///
    /// Calls GET /ping
    pub async fn ping_serving(&self) -> Result<()> {
        let url = format!("{}/ping", self.serving_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::ModelLoadFailed(format!("Scoring server unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::ModelLoadFailed(format!(
                "Scoring server not healthy: {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Pick the newest ready version in `stage`
pub fn select_version(versions: Vec<ModelVersion>, name: &str, stage: &str) -> Result<ModelVersion> {
    versions
        .into_iter()
        .filter(|v| {
            v.current_stage
                .as_deref()
                .map_or(true, |s| s.eq_ignore_ascii_case(stage))
        })
        .filter(ModelVersion::is_ready)
        .max_by_key(|v| v.version.parse::<u64>().unwrap_or(0))
        .ok_or_else(|| {
            ServiceError::ModelLoadFailed(format!(
                "No ready version of '{}' in stage '{}'",
                name, stage
            ))
        })
}

#[async_trait]
impl ModelRegistry for MlflowRegistry {
    async fn load_production(&self, name: &str, stage: &str) -> Result<LoadedModel> {
        let version = self.latest_version(name, stage).await?;
        debug!(model = name, version = %version.version, "Resolved registry version");

        self.ping_serving().await?;

        let classifier = RemoteClassifier::new(self.client.clone(), &self.serving_url);
        debug!(url = classifier.invocations_url(), version = %version.version, "Bound scoring endpoint");

        Ok(LoadedModel {
            classifier: Arc::new(classifier),
            metadata: ModelMetadata {
                name: version.name,
                version: version.version,
                stage: stage.to_string(),
                run_id: version.run_id,
                loaded_at: Utc::now(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(v: &str, stage: &str, status: &str) -> ModelVersion {
        ModelVersion {
            name: "epilepsy_model".to_string(),
            version: v.to_string(),
            current_stage: Some(stage.to_string()),
            status: Some(status.to_string()),
            run_id: None,
            source: None,
        }
    }

    #[test]
    fn test_registry_creation() {
        let registry = MlflowRegistry::new(
            "http://mlflow:5000/",
            "http://serving:5001",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(registry.tracking_uri(), "http://mlflow:5000");
        assert_eq!(registry.serving_url(), "http://serving:5001");
    }

    #[test]
    fn test_registry_from_config() {
        let registry = MlflowRegistry::from_config(&RegistryConfig::default()).unwrap();
        assert_eq!(registry.tracking_uri(), "http://mlflow:5000");
    }

    #[test]
    fn test_select_newest_ready_version() {
        let picked = select_version(
            vec![
                version("2", "Production", "READY"),
                version("10", "Production", "READY"),
                version("11", "Production", "PENDING_REGISTRATION"),
                version("12", "Staging", "READY"),
            ],
            "epilepsy_model",
            "Production",
        )
        .unwrap();
        assert_eq!(picked.version, "10");
    }

    #[test]
    fn test_select_none_available() {
        let err = select_version(Vec::new(), "epilepsy_model", "Production").unwrap_err();
        assert!(matches!(err, ServiceError::ModelLoadFailed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_registry_fails() {
        let registry = MlflowRegistry::new(
            "http://127.0.0.1:1",
            "http://127.0.0.1:1",
            Duration::from_secs(2),
        )
        .unwrap();
        let result = registry.load_production("epilepsy_model", "Production").await;
        assert!(matches!(result, Err(ServiceError::ModelLoadFailed(_))));
    }
}
