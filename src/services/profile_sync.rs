// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile synchronizer: keeps a local edit buffer in step with the
//! remote profile row of the signed-in user.
//!
//! Every load is tagged with a generation number taken when it starts.
//! A session change bumps the generation, so a fetch that resolves after
//! its session was replaced is dropped instead of overwriting the buffer.

use crate::error::BackendError;
use crate::models::{Profile, ProfileFields, Session};
use crate::services::backend::ProfileStore;
use crate::services::session_watcher::{SessionWatcher, WatchedSession};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Confirmation shown after a successful save.
pub const PROFILE_UPDATED: &str = "Profile updated!";

/// Where the synchronizer is in its load/edit/save cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No session.
    Idle,
    Loading,
    Ready,
    Saving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// User-visible acknowledgement of a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success() -> Self {
        Self {
            kind: NoticeKind::Success,
            message: PROFILE_UPDATED.to_string(),
        }
    }

    /// Failure notice carrying the error's own message text.
    pub fn failure(err: &BackendError) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == NoticeKind::Success
    }
}

/// Partial edit of the buffer. `None` leaves a field unchanged; an empty
/// string clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileEdit {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl ProfileEdit {
    fn apply(self, fields: &mut ProfileFields) {
        fn set(slot: &mut Option<String>, value: Option<String>) {
            if let Some(value) = value {
                *slot = if value.is_empty() { None } else { Some(value) };
            }
        }
        set(&mut fields.username, self.username);
        set(&mut fields.website, self.website);
        set(&mut fields.avatar_url, self.avatar_url);
    }
}

/// Why a save was not submitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SaveError {
    #[error("No active session")]
    NoSession,
    #[error("Name is required")]
    NameRequired,
    #[error("Profile is still loading")]
    Loading,
    #[error("A save is already in progress")]
    Saving,
}

/// Why an edit was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("No active session")]
    NoSession,
}

/// Snapshot of the synchronizer for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileView {
    pub state: SyncState,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub fields: ProfileFields,
    /// Outcome of the most recent save under the current session
    pub notice: Option<Notice>,
}

/// Handle for one load, captured when it starts.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    generation: u64,
    session: Session,
    /// A save for this user was in flight when the load started.
    during_save: bool,
}

struct SyncInner {
    state: SyncState,
    session: Option<Session>,
    generation: u64,
    fields: ProfileFields,
    notice: Option<Notice>,
    /// User whose upsert is in flight. Outlives session changes, so a
    /// reload cannot open the way for a second, overlapping save.
    saving: Option<String>,
}

impl SyncInner {
    fn saving_for(&self, user_id: &str) -> bool {
        self.saving.as_deref() == Some(user_id)
    }

    /// Ready, unless an upsert is still pending.
    fn settled_state(&self) -> SyncState {
        if self.saving.is_some() {
            SyncState::Saving
        } else {
            SyncState::Ready
        }
    }
}

/// Loads, buffers and saves the signed-in user's profile row.
#[derive(Clone)]
pub struct ProfileSynchronizer {
    store: Arc<dyn ProfileStore>,
    watcher: SessionWatcher,
    inner: Arc<Mutex<SyncInner>>,
}

impl ProfileSynchronizer {
    pub fn new(store: Arc<dyn ProfileStore>, watcher: SessionWatcher) -> Self {
        Self {
            store,
            watcher,
            inner: Arc::new(Mutex::new(SyncInner {
                state: SyncState::Idle,
                session: None,
                generation: 0,
                fields: ProfileFields::default(),
                notice: None,
                saving: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Follow the watcher for the lifetime of the application, starting
    /// one load per new session.
    pub fn start(&self) -> JoinHandle<()> {
        let receiver = self.watcher.subscribe();
        tokio::spawn(self.clone().follow(receiver))
    }

    async fn follow(self, mut receiver: watch::Receiver<WatchedSession>) {
        loop {
            let session = receiver.borrow_and_update().session.clone();
            if let Some(ticket) = self.session_changed(session) {
                // Loads run on their own so a newer session is not queued
                // behind a slow fetch.
                tokio::spawn(self.clone().load(ticket));
            }

            if receiver.changed().await.is_err() {
                return;
            }
        }
    }

    /// React to a new watched session value.
    ///
    /// Returns the ticket for the fetch to run when the value is a present
    /// session different from the current one. Any change, including to
    /// absent, invalidates loads already in flight.
    pub fn session_changed(&self, session: Option<Session>) -> Option<LoadTicket> {
        let mut inner = self.lock();

        if inner.session == session {
            return None;
        }

        inner.generation += 1;
        inner.notice = None;

        let Some(session) = session else {
            inner.state = SyncState::Idle;
            inner.session = None;
            inner.fields = ProfileFields::default();
            tracing::debug!("Session cleared, edit buffer discarded");
            return None;
        };

        let same_user = inner
            .session
            .as_ref()
            .is_some_and(|current| current.user.id == session.user.id);
        if !same_user {
            inner.fields = ProfileFields::default();
        }

        inner.state = SyncState::Loading;
        inner.session = Some(session.clone());

        tracing::debug!(
            user_id = %session.user_id(),
            generation = inner.generation,
            "Loading profile"
        );

        Some(LoadTicket {
            generation: inner.generation,
            during_save: inner.saving_for(session.user_id()),
            session,
        })
    }

    /// Fetch the profile for `ticket` and apply it unless superseded.
    ///
    /// Returns `false` when the result was discarded as stale.
    pub async fn load(self, ticket: LoadTicket) -> bool {
        let result = self.store.select_profile(&ticket.session).await;

        let mut inner = self.lock();
        if inner.generation != ticket.generation {
            tracing::debug!(
                user_id = %ticket.session.user_id(),
                generation = ticket.generation,
                current = inner.generation,
                "Discarding stale profile fetch"
            );
            return false;
        }

        if ticket.during_save || inner.saving_for(ticket.session.user_id()) {
            // The row may predate the pending write; the buffer is newer.
            tracing::debug!(
                user_id = %ticket.session.user_id(),
                "Keeping edit buffer over fetch racing a save"
            );
            inner.state = inner.settled_state();
            return true;
        }

        match result {
            Ok(Some(fields)) => inner.fields = fields,
            Ok(None) => {
                tracing::info!(user_id = %ticket.session.user_id(), "No profile yet");
                inner.fields = ProfileFields::default();
            }
            Err(e) => {
                // Operator log only; the form keeps its previous values.
                tracing::error!(
                    error = %e,
                    user_id = %ticket.session.user_id(),
                    "Failed to load profile"
                );
            }
        }

        inner.state = inner.settled_state();
        true
    }

    /// Apply user input to the edit buffer.
    pub fn edit(&self, edit: ProfileEdit) -> Result<ProfileFields, EditError> {
        let mut inner = self.lock();
        if inner.state == SyncState::Idle {
            return Err(EditError::NoSession);
        }
        edit.apply(&mut inner.fields);
        Ok(inner.fields.clone())
    }

    /// Write the whole buffer back as the user's profile row.
    ///
    /// Rejections (no session, blank name, busy) never reach the store.
    /// A store failure is not an `Err`: it comes back as an error notice
    /// carrying the failure's message, and the buffer is left as edited.
    pub async fn save(&self) -> Result<Notice, SaveError> {
        let (session, profile) = {
            let mut inner = self.lock();
            if inner.saving.is_some() {
                return Err(SaveError::Saving);
            }
            match inner.state {
                SyncState::Idle => return Err(SaveError::NoSession),
                SyncState::Loading => return Err(SaveError::Loading),
                SyncState::Saving => return Err(SaveError::Saving),
                SyncState::Ready => {}
            }
            if !inner.fields.has_name() {
                return Err(SaveError::NameRequired);
            }
            let Some(session) = inner.session.clone() else {
                return Err(SaveError::NoSession);
            };

            let profile =
                Profile::from_fields(session.user_id(), &inner.fields, chrono::Utc::now());
            inner.state = SyncState::Saving;
            inner.saving = Some(profile.id.clone());
            (session, profile)
        };

        let notice = match self.store.upsert_profile(&session, &profile).await {
            Ok(()) => {
                tracing::info!(user_id = %profile.id, "Profile saved");
                Notice::success()
            }
            Err(e) => {
                tracing::error!(error = %e, user_id = %profile.id, "Failed to save profile");
                Notice::failure(&e)
            }
        };

        let mut inner = self.lock();
        inner.saving = None;
        if inner.state == SyncState::Saving {
            inner.state = SyncState::Ready;
        }
        // A token refresh keeps the notice; a different user never sees it.
        let same_user = inner
            .session
            .as_ref()
            .is_some_and(|current| current.user.id == profile.id);
        if same_user {
            inner.notice = Some(notice.clone());
        }
        Ok(notice)
    }

    /// Request sign-out; the buffer is discarded once the watcher reports
    /// the session gone.
    pub async fn sign_out(&self) {
        self.watcher.sign_out().await;
    }

    pub fn state(&self) -> SyncState {
        self.lock().state
    }

    /// Current state, identity and buffer.
    pub fn snapshot(&self) -> ProfileView {
        let inner = self.lock();
        ProfileView {
            state: inner.state,
            user_id: inner.session.as_ref().map(|s| s.user.id.clone()),
            email: inner.session.as_ref().and_then(|s| s.user.email.clone()),
            fields: inner.fields.clone(),
            notice: inner.notice.clone(),
        }
    }
}
