// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! User Profiler: account page backed by Supabase.
//!
//! A user signs in through Supabase Auth, then views and edits their row
//! in the `profiles` table. This crate provides the session watcher, the
//! profile synchronizer and the JSON API the frontend renders.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::{AuthProvider, ProfileSynchronizer, SessionWatcher};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub auth: Arc<dyn AuthProvider>,
    pub watcher: SessionWatcher,
    pub profile: ProfileSynchronizer,
}
