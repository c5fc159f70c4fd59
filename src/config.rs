//! Application configuration loaded from environment variables.

use crate::db::tables;
use std::env;
use std::time::Duration;

/// Loopback only: every caller of this process acts as the signed-in user.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Supabase project URL (e.g. `https://xyz.supabase.co`)
    pub supabase_url: String,
    /// Supabase anon (public) API key
    pub supabase_anon_key: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Interface the server binds to
    pub host: String,
    /// Server port
    pub port: u16,
    /// Table holding one profile row per user
    pub profiles_table: String,
    /// Timeout applied to every request to Supabase
    pub http_timeout: Duration,
    /// Use in-memory auth and profiles instead of Supabase
    pub offline: bool,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self::test_default()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let offline = env::var("OFFLINE_MODE")
            .map(|v| matches!(v.trim(), "1" | "true"))
            .unwrap_or(false);

        Ok(Self {
            supabase_url: required("SUPABASE_URL", offline)?
                .trim_end_matches('/')
                .to_string(),
            supabase_anon_key: required("SUPABASE_ANON_KEY", offline)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            profiles_table: env::var("PROFILES_TABLE")
                .unwrap_or_else(|_| tables::PROFILES.to_string()),
            http_timeout: Duration::from_secs(
                env::var("HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
            offline,
        })
    }

    /// Offline configuration for tests.
    pub fn test_default() -> Self {
        Self {
            supabase_url: "http://127.0.0.1:54321".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            host: DEFAULT_HOST.to_string(),
            port: 8080,
            profiles_table: tables::PROFILES.to_string(),
            http_timeout: Duration::from_secs(5),
            offline: true,
        }
    }

    /// Socket address the server listens on.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL of the auth (GoTrue) API.
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.supabase_url)
    }

    /// Base URL of the REST (PostgREST) API.
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.supabase_url)
    }
}

/// Read a trimmed variable that only offline mode may leave unset.
fn required(name: &'static str, offline: bool) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) if offline => Ok(String::new()),
        Err(_) => Err(ConfigError::Missing(name)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
