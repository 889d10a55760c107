// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription records and the derived membership status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived membership status stored on the user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Free,
    Expired,
}

impl SubscriptionStatus {
    /// Map a raw subscription lifecycle status to the derived status.
    ///
    /// Only `active` and `expired` carry through. `canceled`, `pending`,
    /// `failed` and anything unrecognized collapse to `Free`.
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "active" => SubscriptionStatus::Active,
            "expired" => SubscriptionStatus::Expired,
            _ => SubscriptionStatus::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Free => "free",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapse a sequence of mapped statuses into one.
///
/// The first `Active` wins immediately. Otherwise an `Expired` seen anywhere
/// wins over the `Free` default.
pub fn derive_status<I>(statuses: I) -> SubscriptionStatus
where
    I: IntoIterator<Item = SubscriptionStatus>,
{
    let mut expired_seen = false;

    for status in statuses {
        match status {
            SubscriptionStatus::Active => return SubscriptionStatus::Active,
            SubscriptionStatus::Expired => expired_seen = true,
            SubscriptionStatus::Free => {}
        }
    }

    if expired_seen {
        SubscriptionStatus::Expired
    } else {
        SubscriptionStatus::Free
    }
}

/// A subscription document as seen by the synchronizer.
///
/// Every field is optional: documents are written by an external process and
/// a missing `userId` has to be handled explicitly rather than coerced.
/// A `status` or `createdAt` of the wrong type reads as absent, so one
/// malformed document cannot fail a query over all of a user's subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    /// Document ID (filled in by the store on reads)
    #[serde(default, alias = "_firestore_id", skip_serializing)]
    pub id: Option<String>,
    /// Owning user document ID
    #[serde(default)]
    pub user_id: Option<String>,
    /// Raw lifecycle status ("active", "expired", "canceled", ...)
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: Option<String>,
    /// Creation time, used to order a user's subscriptions
    #[serde(
        default,
        serialize_with = "firestore::serialize_as_optional_timestamp::serialize",
        deserialize_with = "lenient::timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl SubscriptionRecord {
    pub fn new(user_id: &str, status: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id: Some(user_id.to_string()),
            status: Some(status.to_string()),
            created_at: Some(created_at),
        }
    }

    /// Derived status of this single record. A missing status maps to `Free`.
    pub fn mapped_status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_raw(self.status.as_deref().unwrap_or_default())
    }
}

/// Deserializers that map a value of the wrong type to `None`.
///
/// The Firestore deserializer hands timestamps to `deserialize_any` as
/// RFC3339 strings, so both helpers go through `serde_json::Value`.
mod lenient {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Some(s),
            _ => None,
        })
    }

    pub fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|ts| ts.with_timezone(&Utc)),
            _ => None,
        })
    }
}

/// What a write event did to a subscription document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    /// Neither side of the change carried a document.
    Empty,
}

/// Before/after pair for one write to `subscriptions/{subscription_id}`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionChange {
    pub subscription_id: String,
    pub before: Option<SubscriptionRecord>,
    pub after: Option<SubscriptionRecord>,
}

impl SubscriptionChange {
    pub fn kind(&self) -> ChangeKind {
        match (&self.before, &self.after) {
            (None, Some(_)) => ChangeKind::Created,
            (Some(_), Some(_)) => ChangeKind::Updated,
            (Some(_), None) => ChangeKind::Deleted,
            (None, None) => ChangeKind::Empty,
        }
    }
}
