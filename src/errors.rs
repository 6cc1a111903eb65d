//! Error types for epiguard
//!
//! One error enum covers the inference service, the model registry client
//! and the dataset preparation job. HTTP handlers map it onto status codes
//! in `api::error`.

use thiserror::Error;

/// Main error type for the epiguard service and tools
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Missing, malformed, expired or subject-less bearer token
    #[error("Invalid or expired token")]
    Unauthorized,

    /// No recordings for the requested patient
    #[error("No data found for patient {patient_id}")]
    NotFound { patient_id: i64 },

    /// Dataset and/or model not loaded
    #[error("Model or data not loaded")]
    ServiceUnavailable,

    /// Registry or scoring server could not provide a model
    #[error("Model load failed: {0}")]
    ModelLoadFailed(String),

    /// Any failure while building the batch or running inference
    #[error("Prediction failed: {0}")]
    InternalError(String),

    /// Request could not be interpreted
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Tabular data that does not match the expected layout
    #[error("Dataset error: {0}")]
    DatasetError(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// CSV read/write errors
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Convert anyhow errors to ServiceError
impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Generic(err.to_string())
    }
}
