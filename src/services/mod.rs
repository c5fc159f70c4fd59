// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod backend;
pub mod gotrue;
pub mod memory;
pub mod profile_sync;
pub mod session_watcher;

pub use backend::{AuthProvider, ProfileStore};
pub use gotrue::{AuthService, GoTrueClient};
pub use memory::{MemoryAuth, MemoryProfiles};
pub use profile_sync::{
    Notice, NoticeKind, ProfileEdit, ProfileSynchronizer, ProfileView, SaveError, SyncState,
};
pub use session_watcher::{SessionWatcher, WatchedSession};
