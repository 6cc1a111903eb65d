//! Model loader
//!
//! Pulls the current production model from the registry into the service
//! state. Failures are logged and reflected in the state, never returned.

use crate::config::Config;
use crate::models::client::ModelRegistry;
use crate::state::ServiceState;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What happens to the current model when a load attempt fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadFailurePolicy {
    /// Drop the previous model; the service becomes unready
    DropModel,
    /// Keep serving the previous model
    KeepLastGood,
}

impl ReloadFailurePolicy {
    pub fn from_keep_last_good(keep_last_good: bool) -> Self {
        if keep_last_good {
            ReloadFailurePolicy::KeepLastGood
        } else {
            ReloadFailurePolicy::DropModel
        }
    }
}

/// Loads production models into the service state
pub struct ModelLoader {
    registry: Arc<dyn ModelRegistry>,
    model_name: String,
    stage: String,
    policy: ReloadFailurePolicy,
}

impl ModelLoader {
    /// Create a new model loader
    ///
    /// # Arguments
    /// * `registry` - Where models are resolved
    /// * `model_name` - Registered model name
    /// * `stage` - Stage label to serve (e.g., "Production")
    /// * `policy` - Behavior when loading fails
    pub fn new(
        registry: Arc<dyn ModelRegistry>,
        model_name: impl Into<String>,
        stage: impl Into<String>,
        policy: ReloadFailurePolicy,
    ) -> Self {
        Self {
            registry,
            model_name: model_name.into(),
            stage: stage.into(),
            policy,
        }
    }

    /// Create a loader using the registry and model settings from `config`
    pub fn from_config(registry: Arc<dyn ModelRegistry>, config: &Config) -> Self {
        Self::new(
            registry,
            config.registry.model_name.clone(),
            config.registry.stage.clone(),
            ReloadFailurePolicy::from_keep_last_good(config.model.keep_last_good),
        )
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn policy(&self) -> ReloadFailurePolicy {
        self.policy
    }

    /// Load the production model into `state`
    ///
    /// # Returns
    /// `true` if this attempt installed a new model
    pub async fn load(&self, state: &ServiceState) -> bool {
        // No lock is held across the registry call
        match self.registry.load_production(&self.model_name, &self.stage).await {
            Ok(model) => {
                info!(model = %model.metadata, "Loaded model from registry");
                state.set_model(model).await;
                true
            }
            Err(e) => {
                error!(
                    model = %self.model_name,
                    stage = %self.stage,
                    error = %e,
                    "Failed to load model from registry"
                );
                match self.policy {
                    ReloadFailurePolicy::DropModel => state.clear_model().await,
                    ReloadFailurePolicy::KeepLastGood => {
                        if state.has_model().await {
                            warn!("Keeping previously loaded model");
                        }
                    }
                }
                false
            }
        }
    }
}
