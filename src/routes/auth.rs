// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in, sign-up and sign-out routes.
//!
//! These forward to the auth collaborator. The watcher learns about the
//! new session from the collaborator's notification, not from here.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::Result;
use crate::models::Session;
use crate::AppState;

/// Shortest password the hosted auth service accepts.
const MIN_PASSWORD_LEN: u64 = 6;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-out", post(sign_out))
}

/// Email and password form.
#[derive(Deserialize, Validate)]
pub struct Credentials {
    #[validate(email(message = "Enter a valid email address"))]
    email: String,
    #[validate(length(min = MIN_PASSWORD_LEN, message = "Password is too short"))]
    password: String,
}

/// Result of a sign-in or sign-up attempt.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthResponse {
    pub user_id: Option<String>,
    pub email: Option<String>,
    /// True when the account exists but its email must be confirmed first
    pub confirmation_required: bool,
}

impl AuthResponse {
    fn signed_in(session: &Session) -> Self {
        Self {
            user_id: Some(session.user.id.clone()),
            email: session.user.email.clone(),
            confirmation_required: false,
        }
    }
}

/// Sign in with email and password.
async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AuthResponse>> {
    credentials.validate()?;

    let session = state
        .auth
        .sign_in_with_password(credentials.email.trim(), &credentials.password)
        .await?;

    tracing::info!(user_id = %session.user_id(), "User signed in");
    Ok(Json(AuthResponse::signed_in(&session)))
}

/// Create an account with email and password.
async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    credentials.validate()?;

    let response = match state
        .auth
        .sign_up(credentials.email.trim(), &credentials.password)
        .await?
    {
        Some(session) => {
            tracing::info!(user_id = %session.user_id(), "User signed up");
            AuthResponse::signed_in(&session)
        }
        None => AuthResponse {
            user_id: None,
            email: Some(credentials.email.trim().to_string()),
            confirmation_required: true,
        },
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Sign-out acknowledgement.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SignOutResponse {
    /// Always `"requested"`: the session clears once the change
    /// notification arrives. Poll `/api/session` to observe it.
    pub status: String,
}

/// Request sign-out. Failures are logged and leave the session intact.
async fn sign_out(State(state): State<Arc<AppState>>) -> (StatusCode, Json<SignOutResponse>) {
    state.profile.sign_out().await;

    (
        StatusCode::ACCEPTED,
        Json(SignOutResponse {
            status: "requested".to_string(),
        }),
    )
}
