// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory collaborators for offline mode and tests.
//!
//! Behave like the hosted services from the application's point of view,
//! with hooks to inject failures and to hold a fetch until released.

use crate::error::BackendError;
use crate::models::{
    AuthChangeEvent, AuthStateChange, Profile, ProfileFields, Session, SessionUser,
};
use crate::services::backend::{AuthProvider, ProfileStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, Notify};

/// Lifetime of sessions issued by [`MemoryAuth`].
const SESSION_TTL_SECS: i64 = 3600;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ─── Auth ────────────────────────────────────────────────────

struct Account {
    id: String,
    password: String,
}

/// Auth provider keeping accounts and the current session in memory.
pub struct MemoryAuth {
    accounts: Mutex<HashMap<String, Account>>,
    session: Mutex<Option<Session>>,
    events: broadcast::Sender<AuthStateChange>,
    sign_out_error: Mutex<Option<BackendError>>,
    next_token: AtomicU64,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuth {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            accounts: Mutex::new(HashMap::new()),
            session: Mutex::new(None),
            events,
            sign_out_error: Mutex::new(None),
            next_token: AtomicU64::new(1),
        }
    }

    /// Register an account with a fixed user id.
    pub fn add_account(&self, id: &str, email: &str, password: &str) {
        lock(&self.accounts).insert(
            email.to_lowercase(),
            Account {
                id: id.to_string(),
                password: password.to_string(),
            },
        );
    }

    /// Issue a session for `user` and announce it, as if they signed in.
    pub fn sign_in_as(&self, user: SessionUser) -> Session {
        let session = self.issue(user);
        self.set(AuthChangeEvent::SignedIn, Some(session.clone()));
        session
    }

    /// Replace the current session with fresh tokens for the same user.
    pub fn refresh(&self) -> Option<Session> {
        let user = lock(&self.session).as_ref()?.user.clone();
        let session = self.issue(user);
        self.set(AuthChangeEvent::TokenRefreshed, Some(session.clone()));
        Some(session)
    }

    /// Make every following sign-out fail with `error` (or succeed with `None`).
    pub fn fail_sign_out(&self, error: Option<BackendError>) {
        *lock(&self.sign_out_error) = error;
    }

    fn issue(&self, user: SessionUser) -> Session {
        let n = self.next_token.fetch_add(1, Ordering::Relaxed);
        Session {
            access_token: format!("memory-access-{}", n),
            refresh_token: format!("memory-refresh-{}", n),
            expires_at: chrono::Utc::now().timestamp() + SESSION_TTL_SECS,
            token_type: "bearer".to_string(),
            user,
        }
    }

    fn set(&self, event: AuthChangeEvent, session: Option<Session>) {
        *lock(&self.session) = session.clone();
        let _ = self.events.send(AuthStateChange::new(event, session));
    }
}

#[async_trait::async_trait]
impl AuthProvider for MemoryAuth {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(lock(&self.session).clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        if let Some(error) = lock(&self.sign_out_error).clone() {
            return Err(error);
        }
        self.set(AuthChangeEvent::SignedOut, None);
        Ok(())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let id = {
            let accounts = lock(&self.accounts);
            match accounts.get(&email.to_lowercase()) {
                Some(account) if account.password == password => account.id.clone(),
                _ => {
                    return Err(BackendError::Api {
                        status: 400,
                        message: "Invalid login credentials".to_string(),
                    })
                }
            }
        };

        Ok(self.sign_in_as(SessionUser {
            id,
            email: Some(email.to_string()),
        }))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, BackendError> {
        let id = {
            let mut accounts = lock(&self.accounts);
            let key = email.to_lowercase();
            if accounts.contains_key(&key) {
                return Err(BackendError::Api {
                    status: 422,
                    message: "User already registered".to_string(),
                });
            }
            let id = format!("user-{}", self.next_token.fetch_add(1, Ordering::Relaxed));
            accounts.insert(
                key,
                Account {
                    id: id.clone(),
                    password: password.to_string(),
                },
            );
            id
        };

        Ok(Some(self.sign_in_as(SessionUser {
            id,
            email: Some(email.to_string()),
        })))
    }
}

// ─── Profiles ────────────────────────────────────────────────

/// Profiles table keeping rows in memory.
#[derive(Default)]
pub struct MemoryProfiles {
    rows: Mutex<HashMap<String, Profile>>,
    upserts: Mutex<Vec<Profile>>,
    select_calls: AtomicU64,
    select_error: Mutex<Option<BackendError>>,
    upsert_error: Mutex<Option<BackendError>>,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
    upsert_holds: Mutex<HashMap<String, Arc<Notify>>>,
}

impl MemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored row.
    pub fn insert(&self, profile: Profile) {
        lock(&self.rows).insert(profile.id.clone(), profile);
    }

    /// Stored row for `user_id`, if any.
    pub fn get(&self, user_id: &str) -> Option<Profile> {
        lock(&self.rows).get(user_id).cloned()
    }

    /// Every record passed to `upsert_profile`, in call order.
    pub fn upserts(&self) -> Vec<Profile> {
        lock(&self.upserts).clone()
    }

    /// Number of `select_profile` calls so far.
    pub fn select_calls(&self) -> u64 {
        self.select_calls.load(Ordering::SeqCst)
    }

    /// Make selects fail with `error` (or succeed again with `None`).
    pub fn fail_selects(&self, error: Option<BackendError>) {
        *lock(&self.select_error) = error;
    }

    /// Make upserts fail with `error` (or succeed again with `None`).
    pub fn fail_upserts(&self, error: Option<BackendError>) {
        *lock(&self.upsert_error) = error;
    }

    /// Hold selects for `user_id` until the returned handle is notified.
    pub fn hold_selects(&self, user_id: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        lock(&self.holds).insert(user_id.to_string(), Arc::clone(&notify));
        notify
    }

    /// Hold the next upsert for `user_id` until the returned handle is
    /// notified. The attempt is recorded before it blocks.
    pub fn hold_next_upsert(&self, user_id: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        lock(&self.upsert_holds).insert(user_id.to_string(), Arc::clone(&notify));
        notify
    }
}

#[async_trait::async_trait]
impl ProfileStore for MemoryProfiles {
    async fn select_profile(
        &self,
        session: &Session,
    ) -> Result<Option<ProfileFields>, BackendError> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);

        let hold = lock(&self.holds).get(session.user_id()).cloned();
        if let Some(hold) = hold {
            hold.notified().await;
        }

        if let Some(error) = lock(&self.select_error).clone() {
            return Err(error);
        }

        Ok(lock(&self.rows).get(session.user_id()).map(|row| ProfileFields {
            username: row.username.clone(),
            website: row.website.clone(),
            avatar_url: row.avatar_url.clone(),
        }))
    }

    async fn upsert_profile(
        &self,
        _session: &Session,
        profile: &Profile,
    ) -> Result<(), BackendError> {
        lock(&self.upserts).push(profile.clone());

        let hold = lock(&self.upsert_holds).remove(&profile.id);
        if let Some(hold) = hold {
            hold.notified().await;
        }

        if let Some(error) = lock(&self.upsert_error).clone() {
            return Err(error);
        }

        lock(&self.rows).insert(profile.id.clone(), profile.clone());
        Ok(())
    }
}
