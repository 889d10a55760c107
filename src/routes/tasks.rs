// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Task handler routes for Cloud Tasks callbacks.
//!
//! These endpoints are called by Cloud Tasks, not directly by users.
//! Queue header and OIDC checks are applied in routes/mod.rs.

use crate::error::AppError;
use crate::services::tasks::ResyncUserPayload;
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use std::sync::Arc;

/// Task handler routes (called by Cloud Tasks).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/tasks/resync-user", post(resync_user))
}

/// Resync one user's subscription status (bulk resync fan-out).
async fn resync_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResyncUserPayload>,
) -> StatusCode {
    tracing::info!(
        user_id = %payload.user_id,
        source = %payload.source,
        "Resyncing subscription status from Cloud Task"
    );

    match state
        .sync_service
        .resync_user_subscription_status(&payload.user_id)
        .await
    {
        Ok(status) => {
            tracing::info!(
                user_id = %payload.user_id,
                status = %status,
                "Resync task complete"
            );
            StatusCode::OK
        }
        Err(AppError::NotFound(_)) => {
            // User deleted since the task was queued - don't retry
            tracing::warn!(user_id = %payload.user_id, "User gone, dropping resync task");
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(
                user_id = %payload.user_id,
                error = %e,
                "Resync task failed"
            );
            // Return 500 to trigger Cloud Tasks retry
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
