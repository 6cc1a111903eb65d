//! Production model management
//!
//! - Resolving the current production model from the registry
//! - Scoring batches against the server that hosts it
//! - Installing (and on failure, dropping) the model in the service state

pub mod classifier;
pub mod client;
pub mod manager;
pub mod types;

// Re-export key types for convenience
pub use classifier::{RemoteClassifier, SequenceClassifier};
pub use client::{MlflowRegistry, ModelRegistry};
pub use manager::{ModelLoader, ReloadFailurePolicy};
pub use types::{LoadedModel, ModelMetadata, ModelVersion};
