// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Eventarc route tests: auth, acknowledgement policy, end-to-end status.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use passfit_sync::models::{SubscriptionRecord, SubscriptionStatus, UserRecord};
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::{event_document, invoker_token, subscription_fields};

async fn post_event(app: Router, uri: &str, token: Option<&str>, body: Value) -> StatusCode {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("ce-id", "evt-123")
        .header("ce-type", "google.cloud.firestore.document.v1.written");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_event_without_token_forbidden() {
    let (app, _, store) = common::create_test_app();
    store.insert_user("u1", UserRecord::default());

    let body = json!({ "value": event_document("subscriptions/sub1", subscription_fields("u1", "active")) });
    let status = post_event(app, "/events/subscription-written", None, body).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(store.status_write_count(), 0);
}

#[tokio::test]
async fn test_event_from_admin_principal_forbidden() {
    let (app, state, store) = common::create_test_app();
    store.insert_user("u1", UserRecord::default());
    let token = common::create_test_oidc_jwt(&state.config, &state.config.admin_invoker_emails[0]);

    let body = json!({ "value": event_document("subscriptions/sub1", subscription_fields("u1", "active")) });
    let status = post_event(app, "/events/subscription-written", Some(&token), body).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_subscription_lifecycle_over_http() {
    let (app, state, store) = common::create_test_app();
    let token = invoker_token(&state.config);
    store.insert_user("u1", UserRecord::default());

    // Created active
    let created = event_document("subscriptions/sub1", subscription_fields("u1", "active"));
    let status = post_event(
        app.clone(),
        "/events/subscription-written",
        Some(&token),
        json!({ "value": created }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.user_status("u1"), Some(SubscriptionStatus::Active));

    // Updated to expired
    let updated = event_document("subscriptions/sub1", subscription_fields("u1", "expired"));
    let status = post_event(
        app.clone(),
        "/events/subscription-written",
        Some(&token),
        json!({ "value": updated.clone(), "oldValue": created, "updateMask": {"fieldPaths": ["status"]} }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.user_status("u1"), Some(SubscriptionStatus::Expired));

    // Deleted with no other subscriptions left
    let status = post_event(
        app,
        "/events/subscription-written",
        Some(&token),
        json!({ "oldValue": updated }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.user_status("u1"), Some(SubscriptionStatus::Free));
}

#[tokio::test]
async fn test_delete_rederives_from_remaining() {
    let (app, state, store) = common::create_test_app();
    let token = invoker_token(&state.config);
    store.insert_user("u1", UserRecord::with_status(SubscriptionStatus::Expired));
    store.put_subscription(
        "sub2",
        SubscriptionRecord::new("u1", "active", chrono::Utc::now()),
    );

    let gone = event_document("subscriptions/sub1", subscription_fields("u1", "expired"));
    let status = post_event(
        app,
        "/events/subscription-written",
        Some(&token),
        json!({ "oldValue": gone }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.user_status("u1"), Some(SubscriptionStatus::Active));
}

#[tokio::test]
async fn test_failures_are_acknowledged() {
    let (app, state, store) = common::create_test_app();
    let token = invoker_token(&state.config);
    store.insert_user("u1", UserRecord::default());

    // Missing userId
    let no_user = event_document(
        "subscriptions/sub1",
        json!({ "status": {"stringValue": "active"} }),
    );
    let status = post_event(
        app.clone(),
        "/events/subscription-written",
        Some(&token),
        json!({ "oldValue": no_user }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Store down
    store.set_unavailable(true);
    let body = json!({ "value": event_document("subscriptions/sub2", subscription_fields("u1", "active")) });
    let status = post_event(app, "/events/subscription-written", Some(&token), body).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(store.status_write_count(), 0);
}

#[tokio::test]
async fn test_undecodable_events_are_acknowledged() {
    let (app, state, store) = common::create_test_app();
    let token = invoker_token(&state.config);
    store.insert_user("u1", UserRecord::default());

    for uri in ["/events/subscription-written", "/events/user-created"] {
        let status = post_event(
            app.clone(),
            uri,
            Some(&token),
            json!({ "value": "not a document" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
    }

    assert_eq!(store.status_write_count(), 0);
    assert_eq!(store.user_status("u1"), None);
}

#[tokio::test]
async fn test_user_created_sets_free() {
    let (app, state, store) = common::create_test_app();
    let token = invoker_token(&state.config);
    store.insert_user("u7", UserRecord::default());

    let doc = event_document("users/u7", json!({ "displayName": {"stringValue": "Kim"} }));
    let status = post_event(app, "/events/user-created", Some(&token), json!({ "value": doc })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.user_status("u7"), Some(SubscriptionStatus::Free));
}

#[tokio::test]
async fn test_user_created_with_status_is_untouched() {
    let (app, state, store) = common::create_test_app();
    let token = invoker_token(&state.config);
    store.insert_user("u8", UserRecord::with_status(SubscriptionStatus::Active));

    let doc = event_document(
        "users/u8",
        json!({ "subscriptionStatus": {"stringValue": "active"} }),
    );
    let status = post_event(app, "/events/user-created", Some(&token), json!({ "value": doc })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.status_write_count(), 0);
    assert_eq!(store.user_status("u8"), Some(SubscriptionStatus::Active));
}

#[tokio::test]
async fn test_user_created_write_failure_is_acknowledged() {
    let (app, state, store) = common::create_test_app();
    let token = invoker_token(&state.config);
    store.insert_user("u9", UserRecord::default());
    store.set_unavailable(true);

    let doc = event_document("users/u9", json!({}));
    let status = post_event(app, "/events/user-created", Some(&token), json!({ "value": doc })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.status_write_count(), 0);

    store.set_unavailable(false);
    assert_eq!(store.user_status("u9"), None);
}
