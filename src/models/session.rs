// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session model issued by the hosted auth service.

use serde::{Deserialize, Serialize};

/// Identified user attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Stable user identifier (also the profile record key)
    pub id: String,
    /// Email address (absent for phone-only accounts)
    #[serde(default)]
    pub email: Option<String>,
}

/// Authenticated session snapshot.
///
/// Replaced wholesale on every change notification, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires (Unix timestamp)
    pub expires_at: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: SessionUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// The user identifier that keys this session's profile record.
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

/// Why the auth collaborator's session state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// A single change notification: the event and the session it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStateChange {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

impl AuthStateChange {
    pub fn new(event: AuthChangeEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}
