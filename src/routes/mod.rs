// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod admin;
pub mod events;
pub mod tasks;

use crate::middleware::{require_admin_auth, require_invoker_auth, require_resync_queue};
use crate::AppState;
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // Eventarc triggers (signed as the invoker service account)
    let event_routes = events::routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        require_invoker_auth,
    ));

    // Cloud Tasks callbacks: queue header first, then OIDC
    let task_routes = tasks::routes()
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_invoker_auth,
        ))
        .route_layer(middleware::from_fn(require_resync_queue));

    let admin_routes = admin::routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        require_admin_auth,
    ));

    Router::new()
        .route("/health", get(health_check))
        .merge(event_routes)
        .merge(task_routes)
        .merge(admin_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
