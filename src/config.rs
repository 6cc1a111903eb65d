//! Configuration management for epiguard
//!
//! TOML-based configuration with defaults, environment overrides and
//! validation. Location: `--config <path>` or `~/.epiguard/config.toml`.

use crate::errors::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete configuration for epiguard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// File system paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: String,
    /// Patient file read by the service and written by `prepare`.
    /// Defaults to `<data_dir>/patients_inference/patients_data_updated.csv`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_data_path: Option<String>,
    /// Raw labeled CSV. Defaults to `<data_dir>/raw/Epileptic Seizure Recognition.csv`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data_path: Option<String>,
    /// Output directory for the .npy arrays. Defaults to `<data_dir>/processed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_dir: Option<String>,
    /// Local model artifact location. Not read since models come from the registry.
    pub model_path: String,
}

/// Model registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub tracking_uri: String,
    pub serving_url: String,
    pub model_name: String,
    pub stage: String,
    pub timeout_secs: u64,
}

/// Model input and lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub sequence_length: usize,
    /// Keep the previous model when a reload fails instead of dropping it.
    pub keep_last_good: bool,
}

/// Bearer token configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
}

/// Dataset preparation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub per_class: usize,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            patient_data_path: None,
            raw_data_path: None,
            processed_dir: None,
            model_path: "./production/model/data/model.keras".to_string(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            tracking_uri: "http://mlflow:5000".to_string(),
            serving_url: "http://mlflow-serving:5001".to_string(),
            model_name: "epilepsy_model".to_string(),
            stage: "Production".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sequence_length: 178,
            keep_last_good: false,
        }
    }
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            per_class: 400,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl Config {
    /// Load configuration from file (or defaults), then apply environment overrides
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(config_path) = path {
            Self::load_from_file(&config_path)?
        } else {
            Self::load_default()?
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::ConfigError(format!("Failed to read config: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| ServiceError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".epiguard").join("config.toml");
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Apply overrides from an environment-like lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DATA_PATH") {
            self.paths.data_dir = v;
        }
        if let Some(v) = lookup("MODEL_PATH") {
            self.paths.model_path = v;
        }
        if let Some(v) = lookup("PATIENT_DATA_PATH") {
            self.paths.patient_data_path = Some(v);
        }
        if let Some(v) = lookup("RAW_DATA_PATH") {
            self.paths.raw_data_path = Some(v);
        }
        if let Some(v) = lookup("MLFLOW_TRACKING_URI") {
            self.registry.tracking_uri = v;
        }
        if let Some(v) = lookup("MLFLOW_SERVING_URL") {
            self.registry.serving_url = v;
        }
        if let Some(v) = lookup("MLFLOW_MODEL_NAME") {
            self.registry.model_name = v;
        }
        if let Some(v) = lookup("MLFLOW_MODEL_STAGE") {
            self.registry.stage = v;
        }
        if let Some(v) = lookup("EPIGUARD_JWT_SECRET") {
            self.auth.jwt_secret = Some(v);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(ServiceError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        if self.registry.model_name.trim().is_empty() {
            return Err(ServiceError::ConfigError(
                "registry.model_name must not be empty".to_string(),
            ));
        }

        if self.registry.stage.trim().is_empty() {
            return Err(ServiceError::ConfigError(
                "registry.stage must not be empty".to_string(),
            ));
        }

        if self.model.sequence_length == 0 {
            return Err(ServiceError::ConfigError(
                "model.sequence_length must be greater than 0".to_string(),
            ));
        }

        if self.preprocessing.per_class == 0 {
            return Err(ServiceError::ConfigError(
                "preprocessing.per_class must be greater than 0".to_string(),
            ));
        }

        let fraction = self.preprocessing.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ServiceError::ConfigError(format!(
                "preprocessing.test_fraction must be between 0.0 and 1.0 (exclusive), got {}",
                fraction
            )));
        }

        Ok(())
    }

    /// Token secret, required by the service
    pub fn require_jwt_secret(&self) -> Result<&str> {
        match self.auth.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(secret),
            _ => Err(ServiceError::ConfigError(
                "no token secret configured: set EPIGUARD_JWT_SECRET or auth.jwt_secret".to_string(),
            )),
        }
    }

    /// Render as TOML with the token secret redacted
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.auth.jwt_secret.is_some() {
            shown.auth.jwt_secret = Some("<redacted>".to_string());
        }
        toml::to_string_pretty(&shown)
            .map_err(|e| ServiceError::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Base data directory
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.data_dir)
    }

    /// Patient CSV handed from `prepare` to `serve`
    pub fn patient_data_path(&self) -> PathBuf {
        match &self.paths.patient_data_path {
            Some(p) => Self::expand_path(p),
            None => self
                .data_dir()
                .join("patients_inference")
                .join("patients_data_updated.csv"),
        }
    }

    /// Raw labeled CSV read by `prepare`
    pub fn raw_data_path(&self) -> PathBuf {
        match &self.paths.raw_data_path {
            Some(p) => Self::expand_path(p),
            None => self
                .data_dir()
                .join("raw")
                .join("Epileptic Seizure Recognition.csv"),
        }
    }

    /// Directory receiving the train/test arrays
    pub fn processed_dir(&self) -> PathBuf {
        match &self.paths.processed_dir {
            Some(p) => Self::expand_path(p),
            None => self.data_dir().join("processed"),
        }
    }

    /// Listener address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
