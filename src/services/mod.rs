// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod google_oidc;
pub mod subscription_sync;
pub mod tasks;

pub use google_oidc::{GoogleOidcVerifier, OidcError, VerifiedPrincipal};
pub use subscription_sync::{SubscriptionSyncService, SyncOutcome};
pub use tasks::TasksService;
