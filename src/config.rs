// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;

/// Cloud Tasks queue used for bulk subscription resync.
pub const RESYNC_QUEUE_NAME: &str = "subscription-resync";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region (Cloud Tasks location)
    pub gcp_region: String,
    /// Server port
    pub port: u16,
    /// Public URL of this service. Used as the OIDC audience for
    /// incoming Eventarc/Cloud Tasks requests and as the task target.
    pub service_url: String,
    /// Service account that Eventarc and Cloud Tasks sign requests as
    pub invoker_service_account: String,
    /// Additional principals allowed to call the admin endpoints
    pub admin_invoker_emails: Vec<String>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-central1".to_string(),
            port: 8080,
            service_url: "http://localhost:8080".to_string(),
            invoker_service_account: "passfit-sync@test-project.iam.gserviceaccount.com"
                .to_string(),
            admin_invoker_emails: vec!["ops@test-project.iam.gserviceaccount.com".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let gcp_project_id =
            env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string());

        let invoker_service_account = env::var("INVOKER_SERVICE_ACCOUNT")
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|_| {
                format!("passfit-sync@{}.iam.gserviceaccount.com", gcp_project_id)
            });

        Ok(Self {
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-central1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            service_url: env::var("SERVICE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("SERVICE_URL"))?,
            admin_invoker_emails: parse_email_list(
                &env::var("ADMIN_INVOKER_EMAILS").unwrap_or_default(),
            ),
            invoker_service_account,
            gcp_project_id,
        })
    }

    /// Whether `email` may call the admin endpoints.
    pub fn is_admin_invoker(&self, email: &str) -> bool {
        email == self.invoker_service_account
            || self.admin_invoker_emails.iter().any(|e| e == email)
    }
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
