//! epiguard - Epileptic seizure prediction service
//!
//! Two independent parts sharing one file:
//!
//! - **Inference service**: HTTP endpoints for health, model reload and
//!   per-patient prediction over a loaded patient dataset
//! - **Dataset preparation**: batch job producing train/test arrays and the
//!   patient file the service loads at startup

pub mod errors;

// Re-export commonly used types
pub use errors::{Result, ServiceError};

// Shared
pub mod cli;
pub mod config;
pub mod dataset;
pub mod telemetry;

// Inference service
pub mod api;
pub mod auth;
pub mod inference;
pub mod models;
pub mod server;
pub mod state;

// Dataset preparation
pub mod preprocessing;
