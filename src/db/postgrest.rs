// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgREST client wrapper for the profiles table.
//!
//! Every request carries the project API key plus the signed-in user's
//! access token, so row-level security on the table sees the real user.

use crate::config::Config;
use crate::error::BackendError;
use crate::models::{Profile, ProfileFields, Session};
use crate::services::backend::ProfileStore;

/// Supabase REST (PostgREST) client.
#[derive(Clone)]
pub struct PostgrestDb {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    profiles_table: String,
}

impl PostgrestDb {
    /// Create a new REST client for the configured project.
    pub fn new(config: &Config) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!(
            url = %config.rest_url(),
            table = %config.profiles_table,
            "PostgREST client ready"
        );

        Ok(Self {
            client,
            base_url: config.rest_url(),
            api_key: config.supabase_anon_key.clone(),
            profiles_table: config.profiles_table.clone(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/{}", self.base_url, self.profiles_table)
    }

    /// Check response status and return the API error if not successful.
    async fn check_response(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::from_response(status, &body))
    }
}

#[async_trait::async_trait]
impl ProfileStore for PostgrestDb {
    async fn select_profile(
        &self,
        session: &Session,
    ) -> Result<Option<ProfileFields>, BackendError> {
        // A plain array select: zero rows is a first-time user, not an error.
        let filter = format!("eq.{}", urlencoding::encode(session.user_id()));
        let url = format!(
            "{}?id={}&select={}",
            self.table_url(),
            filter,
            ProfileFields::SELECT
        );

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        let rows: Vec<ProfileFields> = Self::check_response(response).await?.json().await?;

        if rows.len() > 1 {
            tracing::warn!(
                user_id = %session.user_id(),
                rows = rows.len(),
                "Multiple profile rows for one user, using the first"
            );
        }

        Ok(rows.into_iter().next())
    }

    async fn upsert_profile(
        &self,
        session: &Session,
        profile: &Profile,
    ) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.table_url())
            .header("apikey", &self.api_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .bearer_auth(&session.access_token)
            .json(profile)
            .send()
            .await?;

        Self::check_response(response).await?;

        tracing::debug!(user_id = %profile.id, "Profile upserted");
        Ok(())
    }
}
