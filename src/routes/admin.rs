// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes for on-demand subscription resync.
//!
//! Callable by other backend services and operators holding a Google
//! identity token. The auth middleware is applied in routes/mod.rs.

use crate::error::{AppError, Result};
use crate::models::SubscriptionStatus;
use crate::services::google_oidc::VerifiedPrincipal;
use crate::services::tasks::QueueResult;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::post,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

const MAX_USER_ID_LEN: usize = 128;

/// Admin routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/users/{user_id}/resync", post(resync_user))
        .route("/admin/resync", post(bulk_resync))
}

// ─── Single User ─────────────────────────────────────────────

/// Response for a single-user resync.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResyncResponse {
    pub user_id: String,
    pub subscription_status: SubscriptionStatus,
    pub resynced_at: String,
}

/// Recompute one user's subscription status now.
async fn resync_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<VerifiedPrincipal>,
    Path(user_id): Path<String>,
) -> Result<Json<ResyncResponse>> {
    validate_user_id(&user_id)?;

    tracing::info!(
        user_id = %user_id,
        caller = %caller.email,
        "Admin resync requested"
    );

    let store = state.sync_service.store();
    if store.get_user(&user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    let status = state
        .sync_service
        .resync_user_subscription_status(&user_id)
        .await?;

    Ok(Json(ResyncResponse {
        user_id,
        subscription_status: status,
        resynced_at: format_utc_rfc3339(chrono::Utc::now()),
    }))
}

// ─── Bulk ────────────────────────────────────────────────────

/// Request body for a bulk resync.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkResyncRequest {
    #[validate(length(min = 1, max = 500))]
    pub user_ids: Vec<String>,
}

/// Queue a resync task per user.
async fn bulk_resync(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<VerifiedPrincipal>,
    Json(request): Json<BulkResyncRequest>,
) -> Result<Json<QueueResult>> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    for user_id in &request.user_ids {
        validate_user_id(user_id)?;
    }

    let mut user_ids = request.user_ids;
    user_ids.sort();
    user_ids.dedup();

    tracing::info!(
        users = user_ids.len(),
        caller = %caller.email,
        "Admin bulk resync requested"
    );

    let result = state
        .tasks_service
        .queue_resync_users(&state.config.service_url, user_ids)
        .await;

    if result.is_complete_failure() {
        return Err(AppError::Internal(anyhow::anyhow!(
            "failed to queue any of {} resync tasks",
            result.failed
        )));
    }
    if !result.is_complete_success() {
        tracing::warn!(
            queued = result.queued,
            failed = result.failed,
            "Bulk resync partially queued"
        );
    }

    Ok(Json(result))
}

/// Firestore document IDs: non-empty, bounded, no path separators.
fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() || user_id.len() > MAX_USER_ID_LEN {
        return Err(AppError::BadRequest(format!(
            "user_id must be 1-{} bytes",
            MAX_USER_ID_LEN
        )));
    }
    if user_id.contains('/') || user_id == "." || user_id == ".." {
        return Err(AppError::BadRequest(format!(
            "invalid user_id: {}",
            user_id
        )));
    }
    Ok(())
}
