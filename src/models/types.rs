//! Type definitions for the model registry and scoring server
//!
//! Wire types follow the MLflow REST API (`/api/2.0/mlflow/...`) and the
//! MLflow scoring server (`/invocations`).

use crate::models::classifier::SequenceClassifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A registered model version as reported by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Registered model name (e.g., "epilepsy_model")
    pub name: String,

    /// Version number, as a string on the wire
    pub version: String,

    /// Stage label (e.g., "Production")
    #[serde(default)]
    pub current_stage: Option<String>,

    /// Registration status ("READY", "PENDING_REGISTRATION", "FAILED_REGISTRATION")
    #[serde(default)]
    pub status: Option<String>,

    /// Run that produced the artifact
    #[serde(default)]
    pub run_id: Option<String>,

    /// Artifact location
    #[serde(default)]
    pub source: Option<String>,
}

impl ModelVersion {
    /// Whether the registry considers this version usable
    pub fn is_ready(&self) -> bool {
        // Older registries omit status for finished registrations
        matches!(self.status.as_deref(), None | Some("READY"))
    }
}

/// Response from `registered-models/get-latest-versions`
#[derive(Debug, Default, Deserialize)]
pub struct LatestVersionsResponse {
    #[serde(default)]
    pub model_versions: Vec<ModelVersion>,
}

/// Error body returned by the registry
#[derive(Debug, Deserialize)]
pub struct RegistryErrorBody {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Batch sent to the scoring server
#[derive(Debug, Serialize)]
pub struct InvocationRequest<'a> {
    pub instances: &'a [Vec<Vec<f32>>],
}

/// Scores returned by the scoring server, one row per instance
#[derive(Debug, Deserialize)]
pub struct InvocationResponse {
    pub predictions: Vec<Vec<f32>>,
}

/// Where a loaded model came from
#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub name: String,
    pub version: String,
    pub stage: String,
    pub run_id: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

impl fmt::Display for ModelMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{} ({})", self.name, self.version, self.stage)
    }
}

/// A model ready to serve: the classifier plus its provenance
#[derive(Clone)]
pub struct LoadedModel {
    pub classifier: Arc<dyn SequenceClassifier>,
    pub metadata: ModelMetadata,
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
