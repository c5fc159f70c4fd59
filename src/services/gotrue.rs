// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase Auth (GoTrue) client and session holder.
//!
//! Handles:
//! - Password sign-in and sign-up
//! - Sign-out (server-side session revocation)
//! - Token refresh shortly before expiry
//! - Broadcasting session changes to subscribers

use crate::config::Config;
use crate::error::BackendError;
use crate::models::{AuthChangeEvent, AuthStateChange, Session, SessionUser};
use crate::services::backend::AuthProvider;
use serde::Deserialize;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Delay before retrying a refresh that failed for a non-auth reason.
const REFRESH_RETRY_SECS: u64 = 30;

/// Capacity of the change-notification channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Low-level GoTrue HTTP client.
#[derive(Clone)]
pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoTrueClient {
    /// Create a new client for the configured project.
    pub fn new(config: &Config) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.auth_url(),
            api_key: config.supabase_anon_key.clone(),
        })
    }

    /// Exchange email and password for a session.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let url = format!("{}/token?grant_type=password", self.base_url);
        let body = serde_json::json!({ "email": email, "password": password });

        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let token: TokenResponse = Self::check_response_json(response).await?;
        Ok(token.into_session())
    }

    /// Exchange a refresh token for a new session.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let url = format!("{}/token?grant_type=refresh_token", self.base_url);
        let body = serde_json::json!({ "refresh_token": refresh_token });

        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let token: TokenResponse = Self::check_response_json(response).await?;
        Ok(token.into_session())
    }

    /// Register a new user.
    ///
    /// Projects with email confirmation enabled answer with the bare user
    /// and no tokens; that case yields `None`.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Session>, BackendError> {
        let url = format!("{}/signup", self.base_url);
        let body = serde_json::json!({ "email": email, "password": password });

        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let value: serde_json::Value = Self::check_response_json(response).await?;
        if value.get("access_token").is_none() {
            tracing::info!(email, "Sign-up pending email confirmation");
            return Ok(None);
        }

        let token: TokenResponse = serde_json::from_value(value)
            .map_err(|e| BackendError::Decode(format!("Failed to parse sign-up response: {}", e)))?;
        Ok(Some(token.into_session()))
    }

    /// Revoke the session server-side.
    pub async fn logout(&self, access_token: &str) -> Result<(), BackendError> {
        let url = format!("{}/logout", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::from_response(status, &body))
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_response(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(format!("JSON parse error: {}", e)))
    }
}

/// Token grant response from GoTrue.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: SessionUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        // Older GoTrue versions only send `expires_in`.
        let expires_at = self.expires_at.unwrap_or_else(|| {
            chrono::Utc::now().timestamp() + self.expires_in.unwrap_or(3600)
        });

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            user: self.user,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AuthService - session holder with refresh and change notifications
// ─────────────────────────────────────────────────────────────────────────────

struct AuthInner {
    client: GoTrueClient,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthStateChange>,
    refresh_task: Mutex<Option<AbortHandle>>,
}

/// High-level auth service that owns the current session.
///
/// This service encapsulates:
/// - The in-memory session (the single source of truth for this process)
/// - Scheduled token refresh ahead of expiry
/// - Change notifications for sign-in, sign-out and refresh
#[derive(Clone)]
pub struct AuthService {
    inner: Arc<AuthInner>,
}

impl AuthService {
    pub fn new(client: GoTrueClient) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(AuthInner {
                client,
                session: RwLock::new(None),
                events,
                refresh_task: Mutex::new(None),
            }),
        }
    }
}

impl AuthInner {
    fn current(&self) -> Option<Session> {
        match self.session.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the stored session, reschedule refresh, and notify.
    fn set_session(self: &Arc<Self>, event: AuthChangeEvent, session: Option<Session>) {
        match self.session.write() {
            Ok(mut guard) => *guard = session.clone(),
            Err(poisoned) => *poisoned.into_inner() = session.clone(),
        }

        self.schedule_refresh(session.as_ref());

        tracing::info!(
            event = ?event,
            user_id = session.as_ref().map(|s| s.user.id.as_str()).unwrap_or(""),
            "Auth state changed"
        );

        // No receivers is fine: nobody is watching yet.
        let _ = self.events.send(AuthStateChange::new(event, session));
    }

    fn schedule_refresh(self: &Arc<Self>, session: Option<&Session>) {
        let mut slot = match self.refresh_task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = slot.take() {
            handle.abort();
        }

        let Some(session) = session else {
            return;
        };

        let delay = refresh_delay(session.expires_at, chrono::Utc::now().timestamp());
        let refresh_token = session.refresh_token.clone();
        let inner = Arc::clone(self);

        let handle = tokio::spawn(inner.refresh_loop(refresh_token, delay));
        *slot = Some(handle.abort_handle());
    }

    /// Sleep until the token is due, then exchange the refresh token.
    ///
    /// Exits after the session is replaced; `set_session` schedules the
    /// next round and aborts this one.
    async fn refresh_loop(self: Arc<Self>, refresh_token: String, mut delay: Duration) {
        loop {
            tokio::time::sleep(delay).await;
            tracing::debug!("Refreshing access token");

            match self.client.refresh_session(&refresh_token).await {
                Ok(session) => {
                    self.set_session(AuthChangeEvent::TokenRefreshed, Some(session));
                    return;
                }
                Err(e) if e.status().is_some() => {
                    // The refresh token was rejected: the session is gone.
                    tracing::warn!(error = %e, "Token refresh rejected, signing out locally");
                    self.set_session(AuthChangeEvent::SignedOut, None);
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Token refresh failed, will retry");
                    delay = Duration::from_secs(REFRESH_RETRY_SECS);
                }
            }
        }
    }
}

/// Time to wait before refreshing a token that expires at `expires_at`.
fn refresh_delay(expires_at: i64, now: i64) -> Duration {
    let secs = expires_at - TOKEN_REFRESH_MARGIN_SECS - now;
    Duration::from_secs(secs.max(0) as u64)
}

#[async_trait::async_trait]
impl AuthProvider for AuthService {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.inner.current())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.inner.events.subscribe()
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        if let Some(session) = self.inner.current() {
            match self.inner.client.logout(&session.access_token).await {
                Ok(()) => {}
                // Already revoked or expired server-side; clear locally anyway.
                Err(e) if e.is_auth_error() || e.status() == Some(404) => {
                    tracing::info!(error = %e, "Session already invalid server-side");
                }
                Err(e) => return Err(e),
            }
        }

        self.inner.set_session(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let session = self.inner.client.sign_in_with_password(email, password).await?;
        self.inner
            .set_session(AuthChangeEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, BackendError> {
        let session = self.inner.client.sign_up(email, password).await?;
        if let Some(session) = &session {
            self.inner
                .set_session(AuthChangeEvent::SignedIn, Some(session.clone()));
        }
        Ok(session)
    }
}
