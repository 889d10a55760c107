// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Keeps `users/{id}.subscriptionStatus` in step with the `subscriptions`
//! collection.
//!
//! Two error policies apply:
//! - Trigger-driven handling ([`SubscriptionSyncService::handle_subscription_write`])
//!   logs and drops every failure. Eventarc delivers at least once and a
//!   failed delivery would be retried into the same failure.
//! - Explicit calls ([`SubscriptionSyncService::resync_user_subscription_status`],
//!   [`SubscriptionSyncService::initialize_default_status`]) return errors to
//!   the caller.
//!
//! Writes are last-write-wins. Two subscription changes for the same user
//! can race and the later write decides the stored status.

use crate::db::{SubscriptionQuery, SubscriptionStore};
use crate::error::{AppError, Result};
use crate::models::{
    derive_status, SubscriptionChange, SubscriptionRecord, SubscriptionStatus, UserRecord,
};
use std::sync::Arc;

/// Result of handling one subscription write event.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The derived status was written to the user document.
    Written {
        user_id: String,
        status: SubscriptionStatus,
    },
    /// The event carried no document on either side.
    Ignored,
    /// Handling failed; the error has been logged and nothing was retried.
    Dropped(AppError),
}

/// Subscription status synchronizer.
#[derive(Clone)]
pub struct SubscriptionSyncService {
    store: Arc<dyn SubscriptionStore>,
}

impl SubscriptionSyncService {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.store
    }

    /// React to a create/update/delete of one subscription document.
    ///
    /// Create and update trust the changed record's status as-is. Delete
    /// re-derives from the user's remaining subscriptions.
    pub async fn handle_subscription_write(&self, change: &SubscriptionChange) -> SyncOutcome {
        let kind = change.kind();

        let result = match (&change.before, &change.after) {
            (_, Some(after)) => self.apply_changed_record(&change.subscription_id, after).await,
            (Some(before), None) => self.apply_deletion(&change.subscription_id, before).await,
            (None, None) => {
                tracing::warn!(
                    subscription_id = %change.subscription_id,
                    "Subscription event without before or after document, ignoring"
                );
                return SyncOutcome::Ignored;
            }
        };

        match result {
            Ok((user_id, status)) => {
                tracing::info!(
                    subscription_id = %change.subscription_id,
                    user_id = %user_id,
                    change = ?kind,
                    status = %status,
                    "Synchronized subscription status"
                );
                SyncOutcome::Written { user_id, status }
            }
            Err(e) => {
                tracing::error!(
                    subscription_id = %change.subscription_id,
                    change = ?kind,
                    error = %e,
                    "Failed to synchronize subscription status, dropping event"
                );
                SyncOutcome::Dropped(e)
            }
        }
    }

    async fn apply_changed_record(
        &self,
        subscription_id: &str,
        after: &SubscriptionRecord,
    ) -> Result<(String, SubscriptionStatus)> {
        let user_id = required_user_id(subscription_id, after)?;
        let status = after.mapped_status();

        tracing::debug!(
            subscription_id,
            user_id,
            raw_status = after.status.as_deref().unwrap_or("<missing>"),
            mapped = %status,
            "Applying changed subscription"
        );

        self.store.set_subscription_status(user_id, status).await?;
        Ok((user_id.to_string(), status))
    }

    async fn apply_deletion(
        &self,
        subscription_id: &str,
        before: &SubscriptionRecord,
    ) -> Result<(String, SubscriptionStatus)> {
        let user_id = required_user_id(subscription_id, before)?;
        let status = self.derive_from_remaining(user_id).await?;

        self.store.set_subscription_status(user_id, status).await?;
        Ok((user_id.to_string(), status))
    }

    /// Any remaining active subscription wins, then any expired one.
    async fn derive_from_remaining(&self, user_id: &str) -> Result<SubscriptionStatus> {
        let active = self
            .store
            .query_subscriptions(&SubscriptionQuery::for_user(user_id).with_status("active"))
            .await?;
        if !active.is_empty() {
            return Ok(SubscriptionStatus::Active);
        }

        let expired = self
            .store
            .query_subscriptions(&SubscriptionQuery::for_user(user_id).with_status("expired"))
            .await?;
        if !expired.is_empty() {
            return Ok(SubscriptionStatus::Expired);
        }

        Ok(SubscriptionStatus::Free)
    }

    /// Recompute a user's status from all of their subscriptions.
    ///
    /// Subscriptions are read newest first; an active one anywhere wins,
    /// then an expired one, else `free`. Errors are returned to the caller.
    pub async fn resync_user_subscription_status(
        &self,
        user_id: &str,
    ) -> Result<SubscriptionStatus> {
        let subscriptions = self
            .store
            .query_subscriptions(&SubscriptionQuery::for_user(user_id).newest_first())
            .await?;

        let status = derive_status(subscriptions.iter().map(SubscriptionRecord::mapped_status));

        self.store.set_subscription_status(user_id, status).await?;

        tracing::info!(
            user_id,
            subscriptions = subscriptions.len(),
            status = %status,
            "Resynchronized subscription status"
        );

        Ok(status)
    }

    /// Give a newly created user document a `free` status unless it already
    /// has one. Returns whether a write happened.
    pub async fn initialize_default_status(
        &self,
        user_id: &str,
        created: &UserRecord,
    ) -> Result<bool> {
        if created.has_status() {
            tracing::debug!(
                user_id,
                status = created.subscription_status.as_deref().unwrap_or_default(),
                "User already has a subscription status, leaving it"
            );
            return Ok(false);
        }

        self.store
            .set_subscription_status(user_id, SubscriptionStatus::Free)
            .await?;

        tracing::info!(user_id, "Initialized default subscription status");
        Ok(true)
    }
}

fn required_user_id<'a>(subscription_id: &str, record: &'a SubscriptionRecord) -> Result<&'a str> {
    record
        .user_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::MissingField {
            document: format!("subscriptions/{}", subscription_id),
            field: "userId",
        })
}
