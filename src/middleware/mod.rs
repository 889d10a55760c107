// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules.

pub mod invoker_auth;

pub use invoker_auth::{require_admin_auth, require_invoker_auth, require_resync_queue};
