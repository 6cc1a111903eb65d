//! Process-wide service state
//!
//! The patient dataset and the model reference live behind a single lock so
//! readers always see a consistent pair. Writers swap whole `Arc`s.

use crate::dataset::PatientDataset;
use crate::models::types::LoadedModel;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Point-in-time view of the service state
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub dataset: Option<Arc<PatientDataset>>,
    pub model: Option<Arc<LoadedModel>>,
}

impl Snapshot {
    /// Both dataset and model present
    pub fn is_ready(&self) -> bool {
        self.dataset.is_some() && self.model.is_some()
    }
}

/// Shared, cheaply cloneable handle to the service state
#[derive(Debug, Clone, Default)]
pub struct ServiceState {
    inner: Arc<RwLock<Snapshot>>,
}

impl ServiceState {
    /// Empty state: no dataset, no model
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current dataset/model pair
    pub async fn snapshot(&self) -> Snapshot {
        self.inner.read().await.clone()
    }

    pub async fn set_dataset(&self, dataset: PatientDataset) {
        self.inner.write().await.dataset = Some(Arc::new(dataset));
    }

    /// Replace the model reference wholesale
    pub async fn set_model(&self, model: LoadedModel) {
        self.inner.write().await.model = Some(Arc::new(model));
    }

    pub async fn clear_model(&self) {
        self.inner.write().await.model = None;
    }

    pub async fn has_model(&self) -> bool {
        self.inner.read().await.model.is_some()
    }
}
