use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use stormhead_core::types::{SessionId, UserId};

use crate::error::AppError;

/// Who is making the current request.
///
/// Only the session gate creates one, after the bearer token has been
/// verified and its session found. It travels in request extensions, which
/// are keyed by type, so no header or query parameter can supply it.
///
/// ```ignore
/// async fn my_handler(identity: RequestIdentity) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %identity.user_id(), "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestIdentity {
    session_id: SessionId,
    user_id: UserId,
}

impl RequestIdentity {
    pub(crate) fn new(session_id: SessionId, user_id: UserId) -> Self {
        Self {
            session_id,
            user_id,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl<S> FromRequestParts<S> for RequestIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Absent only when a handler is mounted on an allow-listed path.
        parts
            .extensions
            .get::<RequestIdentity>()
            .copied()
            .ok_or_else(|| {
                AppError::InternalError(format!(
                    "no request identity for {}; route is not behind the session gate",
                    parts.uri.path()
                ))
            })
    }
}
