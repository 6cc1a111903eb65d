//! Sequence classifier abstraction
//!
//! A classifier maps a `(N, timesteps, 1)` batch to `(N, classes)` scores.
//! The production implementation delegates to a remote scoring server.

use crate::errors::{Result, ServiceError};
use crate::models::types::{InvocationRequest, InvocationResponse};
use async_trait::async_trait;
use ndarray::{Array2, Array3, Axis};
use reqwest::Client;
use tracing::debug;

/// Anything that can score a batch of single-channel sequences
#[async_trait]
pub trait SequenceClassifier: Send + Sync {
    /// Per-class probabilities, one row per input sequence
    async fn predict(&self, batch: &Array3<f32>) -> Result<Array2<f32>>;
}

/// Classifier backed by an MLflow-compatible scoring server
#[derive(Debug, Clone)]
pub struct RemoteClassifier {
    client: Client,
    invocations_url: String,
}

impl RemoteClassifier {
    /// Create a classifier posting to `{serving_url}/invocations`
    pub fn new(client: Client, serving_url: &str) -> Self {
        Self {
            client,
            invocations_url: format!("{}/invocations", serving_url.trim_end_matches('/')),
        }
    }

    pub fn invocations_url(&self) -> &str {
        &self.invocations_url
    }
}

/// Nested `[row][timestep][channel]` form of a batch, as sent on the wire
pub fn batch_to_instances(batch: &Array3<f32>) -> Vec<Vec<Vec<f32>>> {
    batch
        .axis_iter(Axis(0))
        .map(|recording| {
            recording
                .axis_iter(Axis(0))
                .map(|step| step.to_vec())
                .collect()
        })
        .collect()
}

/// Collect score rows into a matrix, rejecting ragged output
pub fn rows_to_matrix(rows: Vec<Vec<f32>>) -> Result<Array2<f32>> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if rows.iter().any(|r| r.len() != width) {
        return Err(ServiceError::InternalError(
            "scoring server returned rows of different widths".to_string(),
        ));
    }

    let height = rows.len();
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((height, width), flat)
        .map_err(|e| ServiceError::InternalError(format!("invalid score matrix: {}", e)))
}

#[async_trait]
impl SequenceClassifier for RemoteClassifier {
    async fn predict(&self, batch: &Array3<f32>) -> Result<Array2<f32>> {
        let instances = batch_to_instances(batch);
        debug!(url = %self.invocations_url, rows = instances.len(), "Scoring batch");

        let response = self
            .client
            .post(&self.invocations_url)
            .json(&InvocationRequest { instances: &instances })
            .send()
            .await
            .map_err(|e| ServiceError::InternalError(format!("scoring request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ServiceError::InternalError(format!(
                "scoring server returned HTTP {}: {}",
                status, error_text
            )));
        }

        let scores: InvocationResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InternalError(format!("failed to parse scores: {}", e)))?;

        rows_to_matrix(scores.predictions)
    }
}
