//! Route definitions for the `/auth` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST /validate-name   -> validate_name (public)
/// POST /validate-email  -> validate_email (public)
/// POST /register        -> register (public)
/// POST /login           -> login (public)
/// POST /refresh         -> refresh (public)
/// POST /logout          -> logout
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/validate-name", post(auth::validate_name))
        .route("/validate-email", post(auth::validate_email))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
}
