// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! The synchronizer talks to the document store through [`SubscriptionStore`]
//! so the status logic can run against Firestore in production and against
//! [`MemoryStore`] in tests.

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{SubscriptionRecord, SubscriptionStatus, UserRecord};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
}

/// Field names on subscription documents.
pub mod fields {
    pub const USER_ID: &str = "userId";
    pub const STATUS: &str = "status";
    pub const CREATED_AT: &str = "createdAt";
    pub const SUBSCRIPTION_STATUS: &str = "subscriptionStatus";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Query over the `subscriptions` collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionQuery {
    /// Equality filter on `userId`
    pub user_id: String,
    /// Optional equality filter on the raw `status`
    pub status: Option<String>,
    /// Order by `createdAt` descending. As in Firestore, documents without
    /// `createdAt` drop out of an ordered query.
    pub newest_first: bool,
}

impl SubscriptionQuery {
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            status: None,
            newest_first: false,
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    /// Whether a record satisfies the query filters (ordering aside).
    pub fn matches(&self, record: &SubscriptionRecord) -> bool {
        if record.user_id.as_deref() != Some(self.user_id.as_str()) {
            return false;
        }
        if let Some(status) = &self.status {
            if record.status.as_deref() != Some(status.as_str()) {
                return false;
            }
        }
        !(self.newest_first && record.created_at.is_none())
    }
}

/// Document store operations used by the synchronizer.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Point read of `users/{user_id}`.
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, AppError>;

    /// Collection query over `subscriptions`.
    async fn query_subscriptions(
        &self,
        query: &SubscriptionQuery,
    ) -> Result<Vec<SubscriptionRecord>, AppError>;

    /// Partial update of `users/{user_id}`: sets `subscriptionStatus` and a
    /// server-side `updatedAt`. Fails with `NotFound` if the user document
    /// does not exist.
    async fn set_subscription_status(
        &self,
        user_id: &str,
        status: SubscriptionStatus,
    ) -> Result<(), AppError>;
}
