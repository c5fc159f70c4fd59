// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile record stored in the `profiles` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Full profile row, written wholesale on every save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Owning user's identifier (primary key)
    pub id: String,
    pub username: Option<String>,
    pub website: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Build the upsert record for `user_id` from the editable fields.
    pub fn from_fields(user_id: &str, fields: &ProfileFields, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: user_id.to_string(),
            username: fields.username.clone(),
            website: fields.website.clone(),
            avatar_url: fields.avatar_url.clone(),
            updated_at,
        }
    }
}

/// The three user-editable columns.
///
/// Also serves as the local edit buffer. `None` means unset and renders as
/// an empty input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileFields {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl ProfileFields {
    /// Columns requested when loading a profile.
    pub const SELECT: &'static str = "username,website,avatar_url";

    /// A save is only allowed with a non-blank name.
    pub fn has_name(&self) -> bool {
        self.username
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }
}
