// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session and profile API routes.

use crate::error::{AppError, Result};
use crate::models::Session;
use crate::services::profile_sync::{EditError, Notice, ProfileEdit, ProfileView};
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Session status (public: answers for signed-out users too).
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/session", get(get_session))
}

/// Profile routes (require a session).
/// The session middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/profile",
        get(get_profile).patch(edit_profile).post(submit_profile),
    )
}

// ─── Session ─────────────────────────────────────────────────

/// Which top-level view the frontend should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// The initial session query has not finished.
    Loading,
    SignIn,
    Account,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionUserResponse {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub view: View,
    pub user: Option<SessionUserResponse>,
}

/// Current session as seen by the watcher.
async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    let watched = state.watcher.snapshot();

    let view = match (watched.initialized, &watched.session) {
        (false, _) => View::Loading,
        (true, None) => View::SignIn,
        (true, Some(_)) => View::Account,
    };

    Json(SessionResponse {
        view,
        user: watched.session.map(|s| SessionUserResponse {
            id: s.user.id,
            email: s.user.email,
        }),
    })
}

// ─── Profile ─────────────────────────────────────────────────

/// Current profile view (state, identity, edit buffer, last notice).
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Json<ProfileView> {
    tracing::debug!(user_id = %session.user_id(), "Profile requested");
    Json(state.profile.snapshot())
}

/// Change buffer fields without saving.
async fn edit_profile(
    State(state): State<Arc<AppState>>,
    Json(edit): Json<ProfileEdit>,
) -> Result<Json<ProfileView>> {
    state.profile.edit(edit).map_err(|e| match e {
        EditError::NoSession => AppError::Unauthorized,
    })?;
    Ok(Json(state.profile.snapshot()))
}

/// The submitted account form.
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileForm {
    #[validate(custom(function = "not_blank", message = "Name is required"))]
    pub username: String,
    /// Free text; stored as entered
    #[serde(default)]
    pub website: Option<String>,
    /// Free text; stored as entered
    #[serde(default)]
    pub avatar_url: Option<String>,
}

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

impl From<ProfileForm> for ProfileEdit {
    fn from(form: ProfileForm) -> Self {
        Self {
            username: Some(form.username),
            website: Some(form.website.unwrap_or_default()),
            avatar_url: Some(form.avatar_url.unwrap_or_default()),
        }
    }
}

/// Submit the form: copy it into the buffer, then save the whole record.
///
/// A failed write still answers with a notice body (status 502) whose
/// message is the store's own error text.
async fn submit_profile(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(form): Json<ProfileForm>,
) -> Result<(StatusCode, Json<Notice>)> {
    form.validate()?;

    state.profile.edit(form.into()).map_err(|e| match e {
        EditError::NoSession => AppError::Unauthorized,
    })?;

    let notice = state.profile.save().await?;
    let status = if notice.is_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };

    tracing::info!(
        user_id = %session.user_id(),
        success = notice.is_success(),
        "Profile form submitted"
    );

    Ok((status, Json(notice)))
}
