// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session watcher: mirrors the auth collaborator's session for the app.
//!
//! The collaborator is the sole source of truth. Every change notification
//! replaces the local value wholesale, without merging or staleness checks.

use crate::models::{AuthChangeEvent, AuthStateChange, Session};
use crate::services::backend::AuthProvider;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// What the watcher currently knows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchedSession {
    /// False until the initial session query has completed.
    pub initialized: bool,
    pub session: Option<Session>,
}

/// Observes the auth collaborator and exposes the current session.
#[derive(Clone)]
pub struct SessionWatcher {
    auth: Arc<dyn AuthProvider>,
    state: Arc<watch::Sender<WatchedSession>>,
}

impl SessionWatcher {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        let (state, _) = watch::channel(WatchedSession::default());
        Self {
            auth,
            state: Arc::new(state),
        }
    }

    /// Subscribe to change notifications, then query the current session.
    ///
    /// The subscription is registered before the query so a change that
    /// lands in between is not lost. The listener runs for the lifetime of
    /// the application.
    pub async fn start(&self) -> JoinHandle<()> {
        let receiver = self.auth.subscribe();
        self.initialize().await;

        let watcher = self.clone();
        tokio::spawn(watcher.listen(receiver))
    }

    /// Query the collaborator once and mark initialization complete.
    pub async fn initialize(&self) {
        let session = match self.auth.get_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read existing session");
                None
            }
        };

        tracing::info!(signed_in = session.is_some(), "Session watcher initialized");

        self.state.send_replace(WatchedSession {
            initialized: true,
            session,
        });
    }

    /// Apply one change notification.
    pub fn on_change(&self, event: AuthChangeEvent, session: Option<Session>) {
        tracing::debug!(event = ?event, signed_in = session.is_some(), "Session changed");

        self.state.send_modify(|state| {
            state.session = session;
        });
    }

    /// Ask the collaborator to end the session.
    ///
    /// Local state is cleared later by the `SignedOut` notification. A
    /// failure is logged and leaves the current session in place.
    pub async fn sign_out(&self) {
        if let Err(e) = self.auth.sign_out().await {
            tracing::error!(error = %e, "Error signing out");
        }
    }

    /// Current session, if any.
    pub fn current(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.borrow().initialized
    }

    /// Full watcher state (initialization flag and session).
    pub fn snapshot(&self) -> WatchedSession {
        self.state.borrow().clone()
    }

    /// Stream of watcher states for downstream consumers.
    pub fn subscribe(&self) -> watch::Receiver<WatchedSession> {
        self.state.subscribe()
    }

    async fn listen(self, mut receiver: broadcast::Receiver<AuthStateChange>) {
        loop {
            match receiver.recv().await {
                Ok(change) => self.on_change(change.event, change.session),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Only the latest value matters; resync from the source.
                    tracing::warn!(skipped, "Session notifications lagged, resyncing");
                    match self.auth.get_session().await {
                        Ok(session) => self.on_change(AuthChangeEvent::InitialSession, session),
                        Err(e) => tracing::error!(error = %e, "Failed to resync session"),
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Auth provider closed its notification channel");
                    return;
                }
            }
        }
    }
}
