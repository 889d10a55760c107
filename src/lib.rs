// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! PassFit subscription sync: keeps the derived `subscriptionStatus` on
//! PassFit user documents in step with their subscription records.
//!
//! This crate provides the Cloud Run service that receives Firestore
//! triggers through Eventarc and the resync tooling built on the same logic.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{GoogleOidcVerifier, SubscriptionSyncService, TasksService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub sync_service: SubscriptionSyncService,
    pub tasks_service: TasksService,
    pub oidc_verifier: Arc<GoogleOidcVerifier>,
}
