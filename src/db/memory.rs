// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory [`SubscriptionStore`] for tests and local runs.
//!
//! Mirrors the Firestore contract that the synchronizer depends on:
//! status updates require the user document to exist, and ordered queries
//! drop records that lack `createdAt`.

use crate::db::{SubscriptionQuery, SubscriptionStore};
use crate::error::AppError;
use crate::models::{SubscriptionRecord, SubscriptionStatus, UserRecord};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, UserRecord>,
    subscriptions: DashMap<String, SubscriptionRecord>,
    status_writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user_id: &str, user: UserRecord) {
        self.users.insert(user_id.to_string(), user);
    }

    pub fn user(&self, user_id: &str) -> Option<UserRecord> {
        self.users.get(user_id).map(|u| u.clone())
    }

    /// Stored status of a user, if the user exists and holds a known value.
    pub fn user_status(&self, user_id: &str) -> Option<SubscriptionStatus> {
        self.users.get(user_id).and_then(|u| u.status())
    }

    pub fn put_subscription(&self, subscription_id: &str, mut record: SubscriptionRecord) {
        record.id = Some(subscription_id.to_string());
        self.subscriptions
            .insert(subscription_id.to_string(), record);
    }

    pub fn remove_subscription(&self, subscription_id: &str) -> Option<SubscriptionRecord> {
        self.subscriptions
            .remove(subscription_id)
            .map(|(_, record)| record)
    }

    /// Number of successful `set_subscription_status` calls so far.
    pub fn status_write_count(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    /// Make every operation fail with a database error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Database("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, AppError> {
        self.check_available()?;
        Ok(self.user(user_id))
    }

    async fn query_subscriptions(
        &self,
        query: &SubscriptionQuery,
    ) -> Result<Vec<SubscriptionRecord>, AppError> {
        self.check_available()?;

        let mut records: Vec<SubscriptionRecord> = self
            .subscriptions
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        if query.newest_first {
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }

        Ok(records)
    }

    async fn set_subscription_status(
        &self,
        user_id: &str,
        status: SubscriptionStatus,
    ) -> Result<(), AppError> {
        self.check_available()?;

        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        user.subscription_status = Some(status.as_str().to_string());
        user.updated_at = Some(chrono::Utc::now());
        self.status_writes.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_update_requires_existing_user() {
        let store = MemoryStore::new();

        let err = store
            .set_subscription_status("ghost", SubscriptionStatus::Active)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(store.status_write_count(), 0);
    }

    #[tokio::test]
    async fn test_update_sets_status_and_timestamp() {
        let store = MemoryStore::new();
        store.insert_user("u1", UserRecord::default());

        store
            .set_subscription_status("u1", SubscriptionStatus::Expired)
            .await
            .unwrap();

        let user = store.user("u1").unwrap();
        assert_eq!(user.status(), Some(SubscriptionStatus::Expired));
        assert!(user.updated_at.is_some());
        assert_eq!(store.status_write_count(), 1);
    }

    #[tokio::test]
    async fn test_newest_first_ordering() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.put_subscription("old", SubscriptionRecord::new("u1", "expired", now - Duration::days(30)));
        store.put_subscription("new", SubscriptionRecord::new("u1", "active", now));
        store.put_subscription("other", SubscriptionRecord::new("u2", "active", now));

        let records = store
            .query_subscriptions(&SubscriptionQuery::for_user("u1").newest_first())
            .await
            .unwrap();

        let ids: Vec<_> = records.iter().filter_map(|r| r.id.as_deref()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert!(matches!(
            store.get_user("u1").await,
            Err(AppError::Database(_))
        ));
    }
}
