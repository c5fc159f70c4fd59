// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase HTTP clients against a local stub server.
//!
//! The stub speaks just enough of the GoTrue and PostgREST wire formats
//! to check the requests we send and how responses are interpreted.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use user_profiler::config::Config;
use user_profiler::db::PostgrestDb;
use user_profiler::error::BackendError;
use user_profiler::models::{AuthChangeEvent, Profile, ProfileFields, Session, SessionUser};
use user_profiler::services::{AuthProvider, AuthService, GoTrueClient, ProfileStore};

const ANON_KEY: &str = "test_anon_key";

/// One request seen by the stub.
#[derive(Debug, Clone)]
struct Seen {
    path: String,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: Value,
}

#[derive(Default)]
struct Stub {
    seen: Mutex<Vec<Seen>>,
    /// Seconds until expiry for password grants
    password_ttl: Mutex<i64>,
    upsert_status: Mutex<Option<StatusCode>>,
}

impl Stub {
    fn record(&self, path: &str, query: HashMap<String, String>, headers: HeaderMap, body: Value) {
        self.seen.lock().unwrap().push(Seen {
            path: path.to_string(),
            query,
            headers,
            body,
        });
    }

    fn seen(&self, path: &str) -> Vec<Seen> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.path == path)
            .cloned()
            .collect()
    }
}

fn token_body(access: &str, refresh: &str, ttl: i64) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "expires_in": ttl,
        "expires_at": Utc::now().timestamp() + ttl,
        "user": { "id": "u1", "email": "ada@example.com", "aud": "authenticated" }
    })
}

async fn token(
    State(stub): State<Arc<Stub>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    stub.record("/auth/v1/token", query.clone(), headers, body.clone());

    match query.get("grant_type").map(String::as_str) {
        Some("password") if body["password"] == "secret1" => {
            let ttl = *stub.password_ttl.lock().unwrap();
            (StatusCode::OK, Json(token_body("access-1", "refresh-1", ttl)))
        }
        Some("refresh_token") if body["refresh_token"] == "refresh-1" => {
            (StatusCode::OK, Json(token_body("access-2", "refresh-2", 3600)))
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })),
        ),
    }
}

async fn signup(
    State(stub): State<Arc<Stub>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    stub.record("/auth/v1/signup", HashMap::new(), headers, body.clone());
    // Email confirmation enabled: bare user, no tokens.
    Json(json!({
        "id": "u9",
        "email": body["email"],
        "confirmation_sent_at": "2026-01-01T00:00:00Z"
    }))
}

async fn logout(State(stub): State<Arc<Stub>>, headers: HeaderMap) -> StatusCode {
    stub.record("/auth/v1/logout", HashMap::new(), headers, Value::Null);
    StatusCode::NO_CONTENT
}

async fn select_profiles(
    State(stub): State<Arc<Stub>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    stub.record("/rest/v1/profiles", query.clone(), headers, Value::Null);

    match query.get("id").map(String::as_str) {
        Some("eq.u2") => Json(json!([
            { "username": "Lin", "website": "https://lin.dev", "avatar_url": null }
        ])),
        _ => Json(json!([])),
    }
}

async fn upsert_profile(
    State(stub): State<Arc<Stub>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    stub.record("/rest/v1/profiles", HashMap::new(), headers, body);

    match *stub.upsert_status.lock().unwrap() {
        Some(status) => (
            status,
            Json(json!({
                "code": "42501",
                "details": null,
                "hint": null,
                "message": "new row violates row-level security policy for table \"profiles\""
            })),
        ),
        None => (StatusCode::CREATED, Json(Value::Null)),
    }
}

/// Start the stub on an ephemeral port and return a config pointing at it.
async fn spawn_stub() -> (Config, Arc<Stub>) {
    let stub = Arc::new(Stub::default());
    *stub.password_ttl.lock().unwrap() = 3600;

    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/signup", post(signup))
        .route("/auth/v1/logout", post(logout))
        .route("/rest/v1/profiles", get(select_profiles).post(upsert_profile))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = Config {
        supabase_url: format!("http://{}", addr),
        supabase_anon_key: ANON_KEY.to_string(),
        offline: false,
        ..Config::test_default()
    };

    (config, stub)
}

fn session(user_id: &str) -> Session {
    Session {
        access_token: format!("token-{}", user_id),
        refresh_token: "refresh".to_string(),
        expires_at: Utc::now().timestamp() + 3600,
        token_type: "bearer".to_string(),
        user: SessionUser {
            id: user_id.to_string(),
            email: None,
        },
    }
}

// ─── GoTrue ──────────────────────────────────────────────────

#[tokio::test]
async fn test_password_sign_in() {
    let (config, stub) = spawn_stub().await;
    let client = GoTrueClient::new(&config).unwrap();

    let session = client
        .sign_in_with_password("ada@example.com", "secret1")
        .await
        .unwrap();

    assert_eq!(session.access_token, "access-1");
    assert_eq!(session.refresh_token, "refresh-1");
    assert_eq!(session.user_id(), "u1");
    assert_eq!(session.user.email.as_deref(), Some("ada@example.com"));

    let seen = stub.seen("/auth/v1/token");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].query["grant_type"], "password");
    assert_eq!(seen[0].headers["apikey"], ANON_KEY);
    assert_eq!(seen[0].body["email"], "ada@example.com");
}

#[tokio::test]
async fn test_password_sign_in_rejected() {
    let (config, _stub) = spawn_stub().await;
    let client = GoTrueClient::new(&config).unwrap();

    let err = client
        .sign_in_with_password("ada@example.com", "wrong")
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert_eq!(err.to_string(), "Invalid login credentials");
}

#[tokio::test]
async fn test_sign_up_pending_confirmation() {
    let (config, stub) = spawn_stub().await;
    let client = GoTrueClient::new(&config).unwrap();

    let session = client.sign_up("new@example.com", "secret1").await.unwrap();

    assert!(session.is_none());
    assert_eq!(stub.seen("/auth/v1/signup").len(), 1);
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let config = Config {
        // Nothing listens on the discard port.
        supabase_url: "http://127.0.0.1:9".to_string(),
        ..Config::test_default()
    };
    let client = GoTrueClient::new(&config).unwrap();

    let err = client
        .sign_in_with_password("ada@example.com", "secret1")
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::Transport(_)));
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn test_auth_service_notifies_sign_in_and_sign_out() {
    let (config, stub) = spawn_stub().await;
    let auth = AuthService::new(GoTrueClient::new(&config).unwrap());
    let mut events = auth.subscribe();

    auth.sign_in_with_password("ada@example.com", "secret1")
        .await
        .unwrap();

    let change = events.recv().await.unwrap();
    assert_eq!(change.event, AuthChangeEvent::SignedIn);
    assert_eq!(change.session.unwrap().access_token, "access-1");
    assert!(auth.get_session().await.unwrap().is_some());

    auth.sign_out().await.unwrap();

    let change = events.recv().await.unwrap();
    assert_eq!(change.event, AuthChangeEvent::SignedOut);
    assert!(change.session.is_none());
    assert!(auth.get_session().await.unwrap().is_none());

    // The server-side session was revoked with the old access token.
    let seen = stub.seen("/auth/v1/logout");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].headers["authorization"], "Bearer access-1");
}

#[tokio::test]
async fn test_auth_service_refreshes_before_expiry() {
    let (config, stub) = spawn_stub().await;
    // Already inside the refresh margin: refresh right away.
    *stub.password_ttl.lock().unwrap() = 60;
    let auth = AuthService::new(GoTrueClient::new(&config).unwrap());
    let mut events = auth.subscribe();

    auth.sign_in_with_password("ada@example.com", "secret1")
        .await
        .unwrap();
    assert_eq!(events.recv().await.unwrap().event, AuthChangeEvent::SignedIn);

    let change = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("refresh not attempted")
        .unwrap();

    assert_eq!(change.event, AuthChangeEvent::TokenRefreshed);
    let session = change.session.unwrap();
    assert_eq!(session.access_token, "access-2");
    assert_eq!(session.user_id(), "u1");

    let seen = stub.seen("/auth/v1/token");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].query["grant_type"], "refresh_token");
    assert_eq!(seen[1].body["refresh_token"], "refresh-1");
}

// ─── PostgREST ───────────────────────────────────────────────

#[tokio::test]
async fn test_select_existing_profile() {
    let (config, stub) = spawn_stub().await;
    let db = PostgrestDb::new(&config).unwrap();

    let fields = db.select_profile(&session("u2")).await.unwrap().unwrap();

    assert_eq!(fields.username.as_deref(), Some("Lin"));
    assert_eq!(fields.website.as_deref(), Some("https://lin.dev"));
    assert!(fields.avatar_url.is_none());

    let seen = stub.seen("/rest/v1/profiles");
    assert_eq!(seen[0].query["id"], "eq.u2");
    assert_eq!(seen[0].query["select"], ProfileFields::SELECT);
    assert_eq!(seen[0].headers["apikey"], ANON_KEY);
    assert_eq!(seen[0].headers["authorization"], "Bearer token-u2");
}

#[tokio::test]
async fn test_select_missing_profile_is_none() {
    let (config, _stub) = spawn_stub().await;
    let db = PostgrestDb::new(&config).unwrap();

    assert!(db.select_profile(&session("u1")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_upsert_sends_full_record() {
    let (config, stub) = spawn_stub().await;
    let db = PostgrestDb::new(&config).unwrap();
    let profile = Profile {
        id: "u1".to_string(),
        username: Some("Ada".to_string()),
        website: None,
        avatar_url: None,
        updated_at: Utc::now(),
    };

    db.upsert_profile(&session("u1"), &profile).await.unwrap();

    let seen = stub.seen("/rest/v1/profiles");
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].headers["prefer"],
        "resolution=merge-duplicates,return=minimal"
    );
    assert_eq!(seen[0].body["id"], "u1");
    assert_eq!(seen[0].body["username"], "Ada");
    assert!(seen[0].body["website"].is_null());
    assert!(seen[0].body["updated_at"].is_string());
}

#[tokio::test]
async fn test_upsert_error_carries_backend_message() {
    let (config, stub) = spawn_stub().await;
    *stub.upsert_status.lock().unwrap() = Some(StatusCode::FORBIDDEN);
    let db = PostgrestDb::new(&config).unwrap();
    let profile = Profile::from_fields("u1", &ProfileFields::default(), Utc::now());

    let err = db.upsert_profile(&session("u1"), &profile).await.unwrap_err();

    assert_eq!(err.status(), Some(403));
    assert_eq!(
        err.to_string(),
        "new row violates row-level security policy for table \"profiles\""
    );
}
