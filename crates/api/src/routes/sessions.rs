//! Route definitions for the `/sessions` resource.

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Routes mounted at `/sessions`.
///
/// ```text
/// GET    /          -> list
/// GET    /current   -> current
/// DELETE /{id}      -> revoke
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(sessions::list))
        .route("/current", get(sessions::current))
        .route("/{id}", delete(sessions::revoke))
}
