// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod profile;
pub mod session;

pub use profile::{Profile, ProfileFields};
pub use session::{AuthChangeEvent, AuthStateChange, Session, SessionUser};
