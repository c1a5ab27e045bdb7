pub mod auth;
pub mod health;
pub mod sessions;

use axum::Router;

use crate::state::AppState;

/// Paths reachable without a bearer token. Matched exactly against the
/// request path; everything else goes through the session gate.
pub const PUBLIC_OPERATIONS: &[&str] = &[
    "/health",
    "/api/v1/auth/validate-name",
    "/api/v1/auth/validate-email",
    "/api/v1/auth/register",
    "/api/v1/auth/login",
    "/api/v1/auth/refresh",
];

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/validate-name                              name availability (public)
/// /auth/validate-email                             email availability (public)
/// /auth/register                                   create account (public)
/// /auth/login                                      login (public)
/// /auth/refresh                                    refresh (public)
/// /auth/logout                                     logout
///
/// /sessions                                        list own sessions
/// /sessions/current                                the caller's session
/// /sessions/{id}                                   revoke (DELETE, owner only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/sessions", sessions::router())
}
