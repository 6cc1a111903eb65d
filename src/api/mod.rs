//! HTTP surface of the inference service
//!
//! - `GET /health`
//! - `POST /reload-model` (bearer token)
//! - `GET /predict/:patient_id` (bearer token)

pub mod error;
pub mod handlers;

use crate::auth::TokenVerifier;
use crate::errors::ServiceError;
use crate::models::ModelLoader;
use crate::state::ServiceState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Everything a handler needs, shared across requests
#[derive(Clone)]
pub struct AppContext {
    pub state: ServiceState,
    pub loader: Arc<ModelLoader>,
    pub verifier: Arc<TokenVerifier>,
}

/// Username of a caller holding a valid bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

#[async_trait]
impl FromRequestParts<AppContext> for AuthenticatedUser {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, ctx: &AppContext) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        ctx.verifier.verify_header(header).map(AuthenticatedUser)
    }
}

/// Build the service router
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/reload-model", post(handlers::reload_model))
        .route("/predict/:patient_id", get(handlers::predict))
        .with_state(ctx)
}
