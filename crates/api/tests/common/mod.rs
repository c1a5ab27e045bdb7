//! Shared helpers for the HTTP integration tests.
//!
//! The app is assembled with the same [`build_app_router`] the binary uses,
//! over in-memory stores and a [`ManualClock`], so these tests need no
//! database.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use stormhead_api::auth::token::{JwtConfig, TokenIssuer};
use stormhead_api::config::ServerConfig;
use stormhead_api::router::build_app_router;
use stormhead_api::state::AppState;
use stormhead_core::clock::{Clock, ManualClock};
use stormhead_db::memory::{MemorySessionStore, MemoryUserStore};
use stormhead_db::{FingerprintPolicy, SessionStore};
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "correct-horse-battery";
pub const TEST_USER_AGENT: &str = "stormhead-tests/1.0";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        fingerprint_policy: FingerprintPolicy::Allow,
        session_retention_interval_secs: 3600,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
    }
}

/// The router plus handles on the pieces tests need to poke directly.
pub struct TestApp {
    pub app: Router,
    pub clock: Arc<ManualClock>,
    pub sessions: Arc<dyn SessionStore>,
    pub tokens: Arc<TokenIssuer>,
}

pub fn build_test_app() -> TestApp {
    build_test_app_with_policy(FingerprintPolicy::Allow)
}

pub fn build_test_app_with_policy(policy: FingerprintPolicy) -> TestApp {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let sessions: Arc<dyn SessionStore> =
        Arc::new(MemorySessionStore::new(clock.clone(), policy));
    let mut config = test_config();
    config.fingerprint_policy = policy;
    build_test_app_with_store(clock, sessions, config)
}

/// Assemble the app around a caller-supplied session store.
pub fn build_test_app_with_store(
    clock: Arc<ManualClock>,
    sessions: Arc<dyn SessionStore>,
    config: ServerConfig,
) -> TestApp {
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let tokens = Arc::new(TokenIssuer::new(&config.jwt, Arc::clone(&dyn_clock)));

    let state = AppState {
        users: Arc::new(MemoryUserStore::new(dyn_clock)),
        sessions: Arc::clone(&sessions),
        tokens: Arc::clone(&tokens),
    };

    TestApp {
        app: build_app_router(state, &config),
        clock,
        sessions,
        tokens,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.expect("router is infallible")
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header(USER_AGENT, TEST_USER_AGENT)
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

// ---------------------------------------------------------------------------
// Flow helpers
// ---------------------------------------------------------------------------

/// Register `name` (e-mail `{name}@test.com`) and return the user JSON.
pub async fn register(app: &Router, name: &str) -> serde_json::Value {
    let body = serde_json::json!({
        "name": name,
        "email": format!("{name}@test.com"),
        "password": TEST_PASSWORD,
    });
    let response = post_json(app.clone(), "/api/v1/auth/register", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

/// Log in as `name` and return the auth response JSON.
pub async fn login(app: &Router, name: &str) -> serde_json::Value {
    let body = serde_json::json!({
        "email": format!("{name}@test.com"),
        "password": TEST_PASSWORD,
    });
    let response = post_json(app.clone(), "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

pub fn access_token(auth: &serde_json::Value) -> String {
    auth["access_token"].as_str().unwrap().to_string()
}

pub fn refresh_token(auth: &serde_json::Value) -> String {
    auth["refresh_token"].as_str().unwrap().to_string()
}

/// The id of the session an access token belongs to, as the API reports it.
pub async fn current_session_id(app: &Router, token: &str) -> String {
    let response = get_auth(app.clone(), "/api/v1/sessions/current", token).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}
