// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides the [`SubscriptionStore`] operations over:
//! - Users (`subscriptionStatus` / `updatedAt` only)
//! - Subscriptions (read-only, queried by owner)

use crate::db::{collections, fields, SubscriptionQuery, SubscriptionStore};
use crate::error::AppError;
use crate::models::{SubscriptionRecord, SubscriptionStatus, SubscriptionStatusUpdate, UserRecord};
use async_trait::async_trait;
use firestore::{
    FirestoreFieldTransform, FirestoreFieldTransformType, FirestoreQueryDirection,
    FirestoreTransformServerValue, FirestoreWritePrecondition,
};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator accepts any token; skip credential discovery.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Subscription Operations ─────────────────────────────────

    /// Store a subscription document.
    ///
    /// Subscriptions are owned by the billing pipeline; this exists for
    /// seeding the emulator in integration tests.
    pub async fn set_subscription(
        &self,
        subscription_id: &str,
        record: &SubscriptionRecord,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SUBSCRIPTIONS)
            .document_id(subscription_id)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a subscription document (integration test seeding).
    pub async fn delete_subscription(&self, subscription_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::SUBSCRIPTIONS)
            .document_id(subscription_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Create or replace a user document (integration test seeding).
    pub async fn upsert_user(&self, user_id: &str, user: &UserRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

/// Stamp `updatedAt` with the server's request time.
fn updated_at_transform() -> FirestoreFieldTransform {
    FirestoreFieldTransform::new(
        fields::UPDATED_AT.to_string(),
        FirestoreFieldTransformType::SetToServerValue(FirestoreTransformServerValue::RequestTime),
    )
}

#[async_trait]
impl SubscriptionStore for FirestoreDb {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn query_subscriptions(
        &self,
        query: &SubscriptionQuery,
    ) -> Result<Vec<SubscriptionRecord>, AppError> {
        let user_id = query.user_id.clone();
        let status = query.status.clone();

        let select = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SUBSCRIPTIONS)
            .filter(move |q| {
                q.for_all([
                    q.field(fields::USER_ID).eq(user_id.clone()),
                    status
                        .clone()
                        .and_then(|status| q.field(fields::STATUS).eq(status)),
                ])
            });

        let select = if query.newest_first {
            select.order_by([(fields::CREATED_AT, FirestoreQueryDirection::Descending)])
        } else {
            select
        };

        select
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_subscription_status(
        &self,
        user_id: &str,
        status: SubscriptionStatus,
    ) -> Result<(), AppError> {
        let update = SubscriptionStatusUpdate {
            subscription_status: status,
        };

        let result: Result<(), _> = self
            .get_client()?
            .fluent()
            .update()
            .fields([fields::SUBSCRIPTION_STATUS])
            .in_col(collections::USERS)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(user_id)
            .object(&update)
            .transforms(|_| vec![updated_at_transform()])
            .execute()
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(firestore::errors::FirestoreError::DataNotFoundError(_)) => {
                Err(AppError::NotFound(format!("User {} not found", user_id)))
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcloud_sdk::google::firestore::v1::{value::ValueType, Document, Value};

    #[test]
    fn test_status_write_stamps_server_time() {
        let transform = updated_at_transform();

        assert_eq!(transform.field, "updatedAt");
        assert_eq!(
            transform.transform_type,
            FirestoreFieldTransformType::SetToServerValue(FirestoreTransformServerValue::RequestTime)
        );
    }

    fn typed(value_type: ValueType) -> Value {
        Value {
            value_type: Some(value_type),
        }
    }

    fn subscription_doc(fields: Vec<(&str, ValueType)>) -> Document {
        Document {
            name: "projects/test-project/databases/(default)/documents/subscriptions/sub1"
                .to_string(),
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), typed(value)))
                .collect(),
            create_time: None,
            update_time: None,
        }
    }

    #[test]
    fn test_subscription_document_decodes() {
        let doc = subscription_doc(vec![
            ("userId", ValueType::StringValue("u1".to_string())),
            ("status", ValueType::StringValue("active".to_string())),
            (
                "createdAt",
                ValueType::TimestampValue(gcloud_sdk::prost_types::Timestamp {
                    seconds: 1_709_283_600,
                    nanos: 0,
                }),
            ),
        ]);

        let record: SubscriptionRecord = firestore::FirestoreDb::deserialize_doc_to(&doc).unwrap();

        assert_eq!(record.id.as_deref(), Some("sub1"));
        assert_eq!(record.mapped_status(), SubscriptionStatus::Active);
        assert_eq!(record.created_at.map(|ts| ts.timestamp()), Some(1_709_283_600));
    }

    #[test]
    fn test_malformed_subscription_document_still_decodes() {
        let doc = subscription_doc(vec![
            ("userId", ValueType::StringValue("u1".to_string())),
            ("status", ValueType::IntegerValue(3)),
            ("createdAt", ValueType::StringValue("yesterday".to_string())),
        ]);

        let record: SubscriptionRecord = firestore::FirestoreDb::deserialize_doc_to(&doc).unwrap();

        assert_eq!(record.user_id.as_deref(), Some("u1"));
        assert_eq!(record.status, None);
        assert_eq!(record.created_at, None);
        assert_eq!(record.mapped_status(), SubscriptionStatus::Free);
    }

    #[tokio::test]
    async fn test_offline_client_fails_every_operation() {
        let db = FirestoreDb::new_mock();

        assert!(matches!(db.get_user("u1").await, Err(AppError::Database(_))));
        assert!(matches!(
            db.query_subscriptions(&SubscriptionQuery::for_user("u1")).await,
            Err(AppError::Database(_))
        ));
        assert!(matches!(
            db.set_subscription_status("u1", SubscriptionStatus::Free).await,
            Err(AppError::Database(_))
        ));
    }
}
