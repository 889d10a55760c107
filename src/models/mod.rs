// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod event;
pub mod subscription;
pub mod user;

pub use event::{DocumentEventData, EventDocument};
pub use subscription::{
    derive_status, ChangeKind, SubscriptionChange, SubscriptionRecord, SubscriptionStatus,
};
pub use user::{SubscriptionStatusUpdate, UserRecord};
