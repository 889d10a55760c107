// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User record fields owned by the synchronizer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::SubscriptionStatus;

/// The slice of a `users/{user_id}` document this service reads.
///
/// Other profile fields belong to the client app and are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Derived membership status. Kept as the raw string so that a
    /// document carrying an unexpected value still counts as "set".
    #[serde(default)]
    pub subscription_status: Option<String>,
    /// Last synchronization time (server-assigned)
    #[serde(default, with = "firestore::serialize_as_optional_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn with_status(status: SubscriptionStatus) -> Self {
        Self {
            subscription_status: Some(status.as_str().to_string()),
            updated_at: None,
        }
    }

    /// Parsed status, if the stored value is one of the three known ones.
    pub fn status(&self) -> Option<SubscriptionStatus> {
        match self.subscription_status.as_deref()? {
            "active" => Some(SubscriptionStatus::Active),
            "free" => Some(SubscriptionStatus::Free),
            "expired" => Some(SubscriptionStatus::Expired),
            _ => None,
        }
    }

    pub fn has_status(&self) -> bool {
        self.subscription_status.is_some()
    }
}

/// Partial update written to a user document on every synchronization.
///
/// `updatedAt` is not part of the object: the store stamps it server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusUpdate {
    pub subscription_status: SubscriptionStatus,
}
