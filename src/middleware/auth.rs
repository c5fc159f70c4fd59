// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session-required middleware.

use crate::error::AppError;
use crate::models::Session;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Middleware that requires a signed-in session.
///
/// The watcher's session is the only source of truth; a request made
/// before initialization completes is treated as signed out.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session: Session = state.watcher.current().ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}
