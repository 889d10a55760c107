// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OIDC authentication middleware for service-to-service routes.
//!
//! - `/events/*` and `/tasks/*`: only the invoker service account that
//!   Eventarc and Cloud Tasks sign as.
//! - `/admin/*`: the invoker or any configured admin invoker.

use crate::services::google_oidc::{OidcError, VerifiedPrincipal};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Require a token for the invoker service account.
pub async fn require_invoker_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    authorize(&state, request, next, |state, email| {
        email == state.config.invoker_service_account
    })
    .await
}

/// Require a token for an admin invoker.
pub async fn require_admin_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    authorize(&state, request, next, |state, email| {
        state.config.is_admin_invoker(email)
    })
    .await
}

/// Require the Cloud Tasks queue header on `/tasks/*` routes.
///
/// Cloud Run strips `X-CloudTasks-*` headers from external requests, so the
/// header's presence with our queue name means the request came through it.
pub async fn require_resync_queue(request: Request, next: Next) -> Result<Response, StatusCode> {
    let queue_name_header = request.headers().get("x-cloudtasks-queuename");
    let is_valid_queue = queue_name_header
        .and_then(|h| h.to_str().ok())
        .is_some_and(|name| name == crate::config::RESYNC_QUEUE_NAME);

    if !is_valid_queue {
        tracing::warn!(
            header = ?queue_name_header,
            "Blocked tasks request with invalid queue header"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}

async fn authorize(
    state: &AppState,
    mut request: Request,
    next: Next,
    allowed: impl Fn(&AppState, &str) -> bool,
) -> Result<Response, StatusCode> {
    let principal = state
        .oidc_verifier
        .verify_token(request.headers().get(header::AUTHORIZATION))
        .await
        .map_err(|err| match err {
            OidcError::Forbidden(reason) => {
                tracing::warn!(
                    path = %request.uri().path(),
                    reason = %reason,
                    "Blocked request: invalid OIDC token"
                );
                StatusCode::FORBIDDEN
            }
            OidcError::Transient(reason) => {
                tracing::error!(reason = %reason, "OIDC verification transient failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    if !allowed(state, &principal.email) {
        tracing::warn!(
            path = %request.uri().path(),
            email = %principal.email,
            "Blocked request: caller not allowed on this route"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    request.extensions_mut().insert::<VerifiedPrincipal>(principal);
    Ok(next.run(request).await)
}
