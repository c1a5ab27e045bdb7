use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use stormhead_core::error::CoreError;
use stormhead_db::StoreError;

use crate::auth::token::TokenError;
use crate::middleware::auth::GateError;

/// The one message every rejected credential gets, whatever check failed.
pub const UNAUTHENTICATED_MESSAGE: &str = "missing or invalid token";

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent JSON error responses of
/// the form `{"error": message, "code": CODE}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `stormhead_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The session gate refused the request.
    #[error(transparent)]
    Gate(#[from] GateError),

    /// A presented token (e.g. a refresh token) was refused, or minting failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => internal(msg),
            },

            // --- Store errors ---
            AppError::Store(err) => match err {
                StoreError::SessionNotFound(id) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("Session with id {id} not found"),
                ),
                StoreError::DuplicateFingerprint => {
                    (StatusCode::CONFLICT, "CONFLICT", err.to_string())
                }
                StoreError::Conflict(constraint) => (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("Duplicate value violates unique constraint: {constraint}"),
                ),
                StoreError::InvalidCursor(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", err.to_string())
                }
                StoreError::Unavailable(msg) => internal(msg),
            },

            // --- Credential errors ---
            AppError::Gate(GateError::StoreUnavailable(msg)) => internal(msg),
            AppError::Gate(_) => unauthenticated(),
            AppError::Token(TokenError::Signing(msg)) => internal(msg),
            AppError::Token(_) => unauthenticated(),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn unauthenticated() -> (StatusCode, &'static str, String) {
    (
        StatusCode::UNAUTHORIZED,
        "UNAUTHORIZED",
        UNAUTHENTICATED_MESSAGE.to_string(),
    )
}

/// Log the detail; the client only sees a generic message.
fn internal(detail: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %detail, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(errors.to_string()))
    }
}
