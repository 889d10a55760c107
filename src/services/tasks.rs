// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Tasks service for rate-limited bulk resync.
//!
//! A bulk resync request becomes one task per user on the resync queue, so
//! the Firestore load is spread by the queue's dispatch rate rather than
//! landing all at once.
//!
//! Uses the official google-cloud-tasks-v2 SDK.

use crate::error::AppError;
use crate::error::Result;
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const MAX_CONCURRENT_TASKS: usize = 100;

/// Payload sent to the resync task handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResyncUserPayload {
    pub user_id: String,
    pub source: String, // "admin_bulk"
}

/// Result of a bulk queue operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueResult {
    /// Number of users successfully queued.
    pub queued: u32,
    /// Number of users that failed to queue.
    pub failed: u32,
    /// User IDs that failed to queue.
    pub failed_user_ids: Vec<String>,
}

impl QueueResult {
    /// Returns true if every user was queued.
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }

    /// Returns true if nothing could be queued.
    pub fn is_complete_failure(&self) -> bool {
        self.queued == 0 && self.failed > 0
    }
}

/// Cloud Tasks client wrapper.
pub struct TasksService {
    project_id: String,
    location: String,
    queue_name: String,
    service_account_email: String,
    /// Mock: user IDs that should fail when queued (test builds only).
    #[cfg(test)]
    mock_fail_ids: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl TasksService {
    pub fn new(project_id: &str, region: &str, service_account_email: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            location: region.to_string(),
            queue_name: crate::config::RESYNC_QUEUE_NAME.to_string(),
            service_account_email: service_account_email.to_string(),
            #[cfg(test)]
            mock_fail_ids: std::sync::Mutex::new(std::collections::HashSet::new()),
        }
    }

    /// Set user IDs that should fail when queued (test builds only).
    #[cfg(test)]
    pub fn set_mock_fail_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self.mock_fail_ids.lock().unwrap();
        guard.clear();
        guard.extend(ids.into_iter().map(Into::into));
    }

    /// Queue a resync task for one user.
    pub async fn queue_resync_user(
        &self,
        service_url: &str,
        payload: &ResyncUserPayload,
    ) -> Result<()> {
        self.queue_task(service_url, "/tasks/resync-user", payload)
            .await
    }

    /// Generic task queuing helper.
    async fn queue_task<T: Serialize>(
        &self,
        service_url: &str,
        endpoint: &str,
        payload: &T,
    ) -> Result<()> {
        use google_cloud_tasks_v2::client::CloudTasks;
        use google_cloud_tasks_v2::model::{HttpRequest, OidcToken, Task};

        let client = CloudTasks::builder()
            .build()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks client error: {}", e)))?;

        let queue_path = format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, self.queue_name
        );

        let body = serde_json::to_vec(payload)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JSON error: {}", e)))?;

        let http_request = HttpRequest::default()
            .set_url(format!("{}{}", service_url, endpoint))
            .set_http_method("POST")
            .set_body(axum::body::Bytes::from(body))
            .set_headers(std::collections::HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]))
            .set_oidc_token(
                OidcToken::default()
                    .set_service_account_email(self.service_account_email.clone())
                    .set_audience(service_url.to_string()),
            );

        let task = Task::default().set_http_request(http_request);

        let _response = client
            .create_task()
            .set_parent(queue_path)
            .set_task(task)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks create error: {}", e)))?;

        Ok(())
    }

    /// Queue resync tasks for many users.
    ///
    /// Failures are collected per user rather than aborting the batch.
    pub async fn queue_resync_users(&self, service_url: &str, user_ids: Vec<String>) -> QueueResult {
        let count = user_ids.len();
        let queued = Arc::new(AtomicU64::new(0));
        let failed_user_ids = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        stream::iter(user_ids)
            .for_each_concurrent(MAX_CONCURRENT_TASKS, |user_id| {
                let queued = Arc::clone(&queued);
                let failed_user_ids = Arc::clone(&failed_user_ids);
                async move {
                    #[cfg(test)]
                    {
                        let should_fail = self.mock_fail_ids.lock().unwrap().contains(&user_id);
                        if should_fail {
                            tracing::warn!(user_id = %user_id, "Mock failure for user");
                            failed_user_ids.lock().await.push(user_id);
                            return;
                        }
                    }

                    let payload = ResyncUserPayload {
                        user_id,
                        source: "admin_bulk".to_string(),
                    };

                    match self.queue_resync_user(service_url, &payload).await {
                        Ok(_) => {
                            queued.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            tracing::warn!(
                                user_id = %payload.user_id,
                                error = ?e,
                                "Failed to queue subscription resync"
                            );
                            failed_user_ids.lock().await.push(payload.user_id);
                        }
                    }
                }
            })
            .await;

        let queued = queued.load(Ordering::Relaxed) as u32;
        let failed_user_ids = std::mem::take(&mut *failed_user_ids.lock().await);
        let failed = failed_user_ids.len() as u32;

        tracing::info!(
            requested = count,
            succeeded = queued,
            failed,
            "Queued subscription resync tasks"
        );

        QueueResult {
            queued,
            failed,
            failed_user_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_result_complete_success() {
        let result = QueueResult {
            queued: 5,
            failed: 0,
            failed_user_ids: vec![],
        };

        assert!(result.is_complete_success());
        assert!(!result.is_complete_failure());
    }

    #[test]
    fn queue_result_complete_failure() {
        let result = QueueResult {
            queued: 0,
            failed: 2,
            failed_user_ids: vec!["u1".to_string(), "u2".to_string()],
        };

        assert!(!result.is_complete_success());
        assert!(result.is_complete_failure());
    }

    #[test]
    fn queue_result_empty_is_success() {
        let result = QueueResult::default();

        assert!(result.is_complete_success());
        assert!(!result.is_complete_failure());
    }

    #[tokio::test]
    async fn queue_resync_users_mock_failures_are_reported() {
        let service = TasksService::new(
            "test-project",
            "us-central1",
            "passfit-sync@test-project.iam.gserviceaccount.com",
        );

        service.set_mock_fail_ids(["u2", "u3"]);

        let result = service
            .queue_resync_users("http://localhost", vec!["u2".to_string(), "u3".to_string()])
            .await;

        assert!(result.is_complete_failure());
        assert_eq!(result.failed, 2);
        assert!(result.failed_user_ids.contains(&"u2".to_string()));
        assert!(result.failed_user_ids.contains(&"u3".to_string()));
    }

    #[tokio::test]
    async fn queue_resync_users_empty_input() {
        let service = TasksService::new(
            "test-project",
            "us-central1",
            "passfit-sync@test-project.iam.gserviceaccount.com",
        );

        let result = service.queue_resync_users("http://localhost", vec![]).await;

        assert!(result.is_complete_success());
        assert_eq!(result.queued, 0);
        assert_eq!(result.failed, 0);
    }

    #[test]
    fn set_mock_fail_ids_clears_previous() {
        let service = TasksService::new("test-project", "us-central1", "sa@example.com");

        service.set_mock_fail_ids(["a", "b"]);
        service.set_mock_fail_ids(["c"]);

        let guard = service.mock_fail_ids.lock().unwrap();
        assert!(!guard.contains("a"));
        assert!(guard.contains("c"));
    }
}
