// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Eventarc Firestore event payloads.
//!
//! Triggers are configured with `application/json` event data, so each
//! delivery carries a `DocumentEventData` message in its JSON encoding:
//!
//! ```json
//! {
//!   "value":    { "name": ".../documents/subscriptions/sub1", "fields": { ... } },
//!   "oldValue": { ... },
//!   "updateMask": { "fieldPaths": ["status"] }
//! }
//! ```
//!
//! Field values are Firestore typed values (`{"stringValue": "active"}`,
//! `{"timestampValue": "2024-01-15T10:00:00Z"}`, ...).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::models::{SubscriptionChange, SubscriptionRecord, UserRecord};

/// Body of a `google.cloud.firestore.document.v1.*` event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEventData {
    /// Document after the write (absent on delete)
    #[serde(default)]
    pub value: Option<EventDocument>,
    /// Document before the write (absent on create)
    #[serde(default)]
    pub old_value: Option<EventDocument>,
    #[serde(default)]
    pub update_mask: Option<DocumentMask>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMask {
    #[serde(default)]
    pub field_paths: Vec<String>,
}

/// A Firestore document as encoded in event payloads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDocument {
    /// Full resource name: `projects/{p}/databases/{d}/documents/{path}`
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

impl EventDocument {
    /// Last path segment of the resource name.
    pub fn document_id(&self) -> Option<&str> {
        self.name.rsplit('/').next().filter(|id| !id.is_empty())
    }

    /// True when the field exists and holds something other than `nullValue`.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields
            .get(field)
            .is_some_and(|value| value.get("nullValue").is_none())
    }

    /// String value of a field, or `None` if absent or not a string.
    pub fn string_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field)?.get("stringValue")?.as_str()
    }

    /// Timestamp value of a field, or `None` if absent or unparseable.
    pub fn timestamp_field(&self, field: &str) -> Option<DateTime<Utc>> {
        let raw = self.fields.get(field)?.get("timestampValue")?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Read the document as a subscription record.
    pub fn to_subscription_record(&self) -> SubscriptionRecord {
        SubscriptionRecord {
            id: self.document_id().map(str::to_string),
            user_id: self.string_field("userId").map(str::to_string),
            status: self.string_field("status").map(str::to_string),
            created_at: self.timestamp_field("createdAt"),
        }
    }

    /// Read the document as a user record.
    ///
    /// A present but non-string `subscriptionStatus` still counts as set.
    pub fn to_user_record(&self) -> UserRecord {
        let subscription_status = if self.has_field("subscriptionStatus") {
            Some(
                self.string_field("subscriptionStatus")
                    .unwrap_or_default()
                    .to_string(),
            )
        } else {
            None
        };

        UserRecord {
            subscription_status,
            updated_at: self.timestamp_field("updatedAt"),
        }
    }
}

impl DocumentEventData {
    /// Document ID of whichever side of the change is present.
    pub fn document_id(&self) -> Option<&str> {
        self.value
            .as_ref()
            .or(self.old_value.as_ref())
            .and_then(EventDocument::document_id)
    }

    /// Convert to a subscription change. `fallback_id` is used when neither
    /// document carries a resource name (e.g. taken from the `ce-subject`).
    pub fn into_subscription_change(self, fallback_id: Option<&str>) -> SubscriptionChange {
        let subscription_id = self
            .document_id()
            .or(fallback_id)
            .unwrap_or("<unknown>")
            .to_string();

        SubscriptionChange {
            subscription_id,
            before: self.old_value.as_ref().map(EventDocument::to_subscription_record),
            after: self.value.as_ref().map(EventDocument::to_subscription_record),
        }
    }
}
