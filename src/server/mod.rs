//! Service startup
//!
//! Startup order: token secret, patient dataset, production model. A
//! missing secret or unreadable dataset aborts startup; a model that cannot
//! be loaded only leaves the service unready.

use crate::api::{router, AppContext};
use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::dataset::PatientDataset;
use crate::errors::Result;
use crate::models::{MlflowRegistry, ModelLoader, ModelRegistry};
use crate::state::ServiceState;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Build the shared context, loading data and the model
pub async fn bootstrap(config: &Config, registry: Arc<dyn ModelRegistry>) -> Result<AppContext> {
    let verifier = TokenVerifier::new(config.require_jwt_secret()?);

    let path = config.patient_data_path();
    let dataset = PatientDataset::load(&path, config.model.sequence_length).map_err(|e| {
        error!(path = %path.display(), error = %e, "Startup failed");
        e
    })?;

    let state = ServiceState::new();
    state.set_dataset(dataset).await;

    let loader = ModelLoader::from_config(registry, config);
    info!(
        model = loader.model_name(),
        stage = loader.stage(),
        policy = ?loader.policy(),
        "Loading production model"
    );
    if !loader.load(&state).await {
        warn!("Starting without a model; use POST /reload-model once the registry is available");
    }

    Ok(AppContext {
        state,
        loader: Arc::new(loader),
        verifier: Arc::new(verifier),
    })
}

/// Run the HTTP service until Ctrl-C
pub async fn serve(config: &Config) -> Result<()> {
    let registry = Arc::new(MlflowRegistry::from_config(&config.registry)?);
    let ctx = bootstrap(config, registry).await?;

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Inference service listening");

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Inference service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}
