// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PassFit subscription sync server.
//!
//! Receives Firestore triggers from Eventarc and keeps each user's derived
//! subscription status current.

use passfit_sync::{
    config::Config,
    db::FirestoreDb,
    services::{GoogleOidcVerifier, SubscriptionSyncService, TasksService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting PassFit subscription sync");

    let db = FirestoreDb::new(&config.gcp_project_id).await?;
    let sync_service = SubscriptionSyncService::new(Arc::new(db));

    let tasks_service = TasksService::new(
        &config.gcp_project_id,
        &config.gcp_region,
        &config.invoker_service_account,
    );
    tracing::info!(
        project = %config.gcp_project_id,
        region = %config.gcp_region,
        "Cloud Tasks service initialized"
    );

    let oidc_verifier = Arc::new(GoogleOidcVerifier::new(&config)?);

    let state = Arc::new(AppState {
        config: config.clone(),
        sync_service,
        tasks_service,
        oidc_verifier,
    });

    let app = passfit_sync::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("passfit_sync=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();

    Ok(())
}
