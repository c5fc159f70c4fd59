// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Collaborator traits for the hosted auth service and the profiles table.
//!
//! The watcher and synchronizer only see these traits, so tests can hand
//! them in-memory fakes instead of a live Supabase project.

use crate::error::BackendError;
use crate::models::{AuthStateChange, Profile, ProfileFields, Session};
use tokio::sync::broadcast;

/// Hosted authentication service.
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current session, if one exists.
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    /// Stream of session changes (sign-in, sign-out, token refresh).
    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange>;

    /// Terminate the current session.
    ///
    /// Success is announced through a `SignedOut` change, not by the return.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Sign in with email and password.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError>;

    /// Register a new account.
    ///
    /// Returns `None` when the project requires email confirmation first.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, BackendError>;
}

/// Hosted table holding one profile row per user.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Select the editable columns of the row keyed by the session's user.
    async fn select_profile(&self, session: &Session)
        -> Result<Option<ProfileFields>, BackendError>;

    /// Insert or fully replace the row keyed by `profile.id`.
    async fn upsert_profile(&self, session: &Session, profile: &Profile)
        -> Result<(), BackendError>;
}
