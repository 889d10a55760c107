// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Eventarc trigger routes for Firestore document events.
//!
//! Eventarc delivers through Pub/Sub push, which redelivers on any non-2xx
//! response, 4xx included. Every delivery is therefore acknowledged with 200:
//! undecodable payloads and failed writes are logged at error level and
//! dropped.

use crate::models::DocumentEventData;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use std::sync::Arc;

/// Eventarc routes. Auth is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/subscription-written", post(subscription_written))
        .route("/events/user-created", post(user_created))
}

/// CloudEvents binary-mode attributes we log with every delivery.
struct CloudEventMeta<'a> {
    id: &'a str,
    event_type: &'a str,
    subject: Option<&'a str>,
}

impl<'a> CloudEventMeta<'a> {
    fn from_headers(headers: &'a HeaderMap) -> Self {
        let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            id: get("ce-id").unwrap_or("<none>"),
            event_type: get("ce-type").unwrap_or("<none>"),
            subject: get("ce-subject"),
        }
    }

    /// Document ID from a subject like `documents/subscriptions/sub1`.
    fn subject_document_id(&self) -> Option<&'a str> {
        self.subject
            .and_then(|s| s.rsplit('/').next())
            .filter(|id| !id.is_empty())
    }
}

/// Decode the event body, logging and returning `None` when it is not a
/// Firestore document event.
fn decode_event(body: &[u8], meta: &CloudEventMeta<'_>) -> Option<DocumentEventData> {
    match serde_json::from_slice(body) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::error!(
                event_id = meta.id,
                event_type = meta.event_type,
                error = %e,
                "Failed to decode Firestore event payload, dropping event"
            );
            None
        }
    }
}

/// Handle a create/update/delete on `subscriptions/{id}`.
async fn subscription_written(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let meta = CloudEventMeta::from_headers(&headers);
    let Some(event) = decode_event(&body, &meta) else {
        return StatusCode::OK;
    };

    let change = event.into_subscription_change(meta.subject_document_id());

    tracing::info!(
        event_id = meta.id,
        event_type = meta.event_type,
        subscription_id = %change.subscription_id,
        change = ?change.kind(),
        "Subscription event received"
    );

    // Outcome is logged inside; every outcome is acknowledged.
    let _ = state.sync_service.handle_subscription_write(&change).await;

    StatusCode::OK
}

/// Handle creation of `users/{id}`.
async fn user_created(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let meta = CloudEventMeta::from_headers(&headers);
    let Some(event) = decode_event(&body, &meta) else {
        return StatusCode::OK;
    };

    let Some(user_id) = event
        .document_id()
        .or(meta.subject_document_id())
        .map(str::to_string)
    else {
        tracing::error!(event_id = meta.id, "User event without a document name");
        return StatusCode::OK;
    };

    let Some(created) = event.value.as_ref() else {
        tracing::warn!(
            event_id = meta.id,
            user_id = %user_id,
            "User event without a created document, ignoring"
        );
        return StatusCode::OK;
    };

    if let Err(e) = state
        .sync_service
        .initialize_default_status(&user_id, &created.to_user_record())
        .await
    {
        tracing::error!(
            event_id = meta.id,
            user_id = %user_id,
            error = %e,
            "Failed to initialize default subscription status, dropping event"
        );
    }

    StatusCode::OK
}
