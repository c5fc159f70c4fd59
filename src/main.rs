// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User Profiler API Server
//!
//! Serves the account page: the current Supabase session and the
//! signed-in user's profile record.

use anyhow::Context;
use user_profiler::{
    config::Config,
    db::PostgrestDb,
    services::{
        AuthProvider, AuthService, GoTrueClient, MemoryAuth, MemoryProfiles, ProfileStore,
        ProfileSynchronizer, SessionWatcher,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, offline = config.offline, "Starting User Profiler API");

    let (auth, store): (Arc<dyn AuthProvider>, Arc<dyn ProfileStore>) = if config.offline {
        tracing::warn!("OFFLINE_MODE set, using in-memory auth and profiles");
        (Arc::new(MemoryAuth::new()), Arc::new(MemoryProfiles::new()))
    } else {
        let gotrue = GoTrueClient::new(&config).context("Failed to create auth client")?;
        let db = PostgrestDb::new(&config).context("Failed to create REST client")?;
        tracing::info!(url = %config.supabase_url, "Supabase clients initialized");
        (Arc::new(AuthService::new(gotrue)), Arc::new(db))
    };

    // The watcher must be initialized before the synchronizer follows it
    let watcher = SessionWatcher::new(auth.clone());
    watcher.start().await;
    tracing::info!(
        signed_in = watcher.current().is_some(),
        "Session watcher initialized"
    );

    let profile = ProfileSynchronizer::new(store, watcher.clone());
    profile.start();

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        auth,
        watcher,
        profile,
    });

    // Build router
    let app = user_profiler::routes::create_router(state);

    // Start server
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("user_profiler=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
