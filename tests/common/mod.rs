// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use passfit_sync::config::Config;
use passfit_sync::db::{FirestoreDb, MemoryStore};
use passfit_sync::routes::create_router;
use passfit_sync::services::{GoogleOidcVerifier, SubscriptionSyncService, TasksService};
use passfit_sync::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const TEST_KID: &str = "passfit-test-key";
const TEST_PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/oidc_test_key.pem");
const TEST_PUBLIC_KEY: &[u8] = include_bytes!("../fixtures/oidc_test_key.pub.pem");

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app backed by an in-memory store.
/// Returns the router, the shared state and the store.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<MemoryStore>) {
    let config = Config::default();
    let store = Arc::new(MemoryStore::new());

    let oidc_verifier = GoogleOidcVerifier::new_with_static_key(
        &config,
        TEST_KID,
        DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY).expect("test public key"),
    )
    .expect("static verifier");

    let tasks_service = TasksService::new(
        &config.gcp_project_id,
        &config.gcp_region,
        &config.invoker_service_account,
    );

    let state = Arc::new(AppState {
        sync_service: SubscriptionSyncService::new(store.clone()),
        tasks_service,
        oidc_verifier: Arc::new(oidc_verifier),
        config,
    });

    (create_router(state.clone()), state, store)
}

/// Mint a Google-style ID token signed with the test key.
#[allow(dead_code)]
pub fn create_test_oidc_jwt(config: &Config, email: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let claims = json!({
        "iss": "https://accounts.google.com",
        "aud": config.service_url,
        "sub": "113355779900",
        "email": email,
        "email_verified": true,
        "iat": now,
        "exp": now + 3600,
    });

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());

    jsonwebtoken::encode(
        &header,
        &claims,
        &EncodingKey::from_rsa_pem(TEST_PRIVATE_KEY).expect("test private key"),
    )
    .expect("sign test token")
}

/// Token for the invoker service account (Eventarc / Cloud Tasks).
#[allow(dead_code)]
pub fn invoker_token(config: &Config) -> String {
    create_test_oidc_jwt(config, &config.invoker_service_account)
}

/// Firestore event document in Eventarc JSON form.
#[allow(dead_code)]
pub fn event_document(path: &str, fields: Value) -> Value {
    json!({
        "name": format!("projects/test-project/databases/(default)/documents/{}", path),
        "fields": fields,
        "createTime": "2024-03-01T09:00:00.000000Z",
        "updateTime": "2024-03-01T09:00:00.000000Z"
    })
}

/// Typed fields of a subscription document.
#[allow(dead_code)]
pub fn subscription_fields(user_id: &str, status: &str) -> Value {
    json!({
        "userId": {"stringValue": user_id},
        "status": {"stringValue": status},
        "createdAt": {"timestampValue": "2024-03-01T09:00:00Z"}
    })
}
