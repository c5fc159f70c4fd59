// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use user_profiler::config::Config;
use user_profiler::routes::create_router;
use user_profiler::services::{MemoryAuth, MemoryProfiles, ProfileSynchronizer, SessionWatcher};
use user_profiler::AppState;

/// Test app wired to in-memory collaborators.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub auth: Arc<MemoryAuth>,
    pub profiles: Arc<MemoryProfiles>,
}

/// Create a test app with offline mock dependencies.
///
/// The watcher is initialized and the synchronizer is following it
/// before this returns.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    create_test_app_with(Arc::new(MemoryAuth::new()), Arc::new(MemoryProfiles::new())).await
}

/// Like [`create_test_app`], with pre-seeded collaborators.
#[allow(dead_code)]
pub async fn create_test_app_with(auth: Arc<MemoryAuth>, profiles: Arc<MemoryProfiles>) -> TestApp {
    let config = Config::test_default();

    let watcher = SessionWatcher::new(auth.clone());
    watcher.start().await;

    let profile = ProfileSynchronizer::new(profiles.clone(), watcher.clone());
    profile.start();

    let state = Arc::new(AppState {
        config,
        auth: auth.clone(),
        watcher,
        profile,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        auth,
        profiles,
    }
}

/// Send a request with an optional JSON body.
#[allow(dead_code)]
pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    app.clone().oneshot(request).await.unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// GET a route and return status plus JSON body.
#[allow(dead_code)]
pub async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = send(app, "GET", uri, None).await;
    let status = response.status();
    (status, json_body(response).await)
}

/// Poll `condition` until it holds, failing the test after two seconds.
#[allow(dead_code)]
pub async fn wait_until<F: FnMut() -> bool>(mut condition: F) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
