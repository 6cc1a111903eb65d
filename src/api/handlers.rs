//! Endpoint handlers: health, model reload, per-patient prediction

use crate::api::{AppContext, AuthenticatedUser};
use crate::errors::{Result, ServiceError};
use crate::inference::{predict_patient, PatientPrediction};
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Body of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub data_loaded: bool,
    pub data_shape: Option<(usize, usize)>,
    pub model_version: Option<String>,
    pub model_loaded_at: Option<DateTime<Utc>>,
}

/// Body of a successful `POST /reload-model`
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub message: String,
    pub model_version: String,
}

/// Report readiness; never fails
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    let snapshot = ctx.state.snapshot().await;

    Json(HealthResponse {
        status: "healthy",
        model_loaded: snapshot.model.is_some(),
        data_loaded: snapshot.dataset.is_some(),
        data_shape: snapshot.dataset.as_ref().map(|d| d.shape()),
        model_version: snapshot.model.as_ref().map(|m| m.metadata.version.clone()),
        model_loaded_at: snapshot.model.as_ref().map(|m| m.metadata.loaded_at),
    })
}

/// Re-resolve the production model
pub async fn reload_model(
    State(ctx): State<AppContext>,
    AuthenticatedUser(username): AuthenticatedUser,
) -> Result<Json<ReloadResponse>> {
    info!(user = %username, "Model reload requested");

    let installed = ctx.loader.load(&ctx.state).await;
    let snapshot = ctx.state.snapshot().await;

    match (installed, snapshot.model) {
        (true, Some(model)) => Ok(Json(ReloadResponse {
            message: format!("Model reloaded from registry: {}", model.metadata),
            model_version: model.metadata.version.clone(),
        })),
        _ => {
            warn!(user = %username, "Model reload failed");
            Err(ServiceError::ModelLoadFailed(format!(
                "could not load '{}' ({})",
                ctx.loader.model_name(),
                ctx.loader.stage()
            )))
        }
    }
}

/// Predict every recording of one patient
pub async fn predict(
    State(ctx): State<AppContext>,
    AuthenticatedUser(username): AuthenticatedUser,
    patient_id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<PatientPrediction>> {
    let Path(patient_id) =
        patient_id.map_err(|e| ServiceError::BadRequest(format!("invalid patient id: {}", e)))?;

    let snapshot = ctx.state.snapshot().await;
    let prediction = predict_patient(&snapshot, patient_id, &username).await?;
    Ok(Json(prediction))
}
