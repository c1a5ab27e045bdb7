//! Handlers for the `/sessions` resource.
//!
//! Every handler here runs behind the session gate and acts on behalf of the
//! caller's [`RequestIdentity`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use stormhead_core::error::CoreError;
use stormhead_core::pagination::{Page, PageRequest};
use stormhead_core::types::SessionId;
use stormhead_db::models::session::Session;

use crate::auth::identity::RequestIdentity;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/sessions/current
pub async fn current(
    State(state): State<AppState>,
    identity: RequestIdentity,
) -> AppResult<Json<DataResponse<Session>>> {
    let session = state.sessions.get_session(identity.session_id()).await?;
    Ok(Json(DataResponse { data: session }))
}

/// GET /api/v1/sessions?cursor=&limit=
///
/// The caller's sessions, newest first. An unknown cursor is a 400.
pub async fn list(
    State(state): State<AppState>,
    identity: RequestIdentity,
    Query(page): Query<PageRequest>,
) -> AppResult<Json<DataResponse<Page<Session>>>> {
    let page = state
        .sessions
        .list_sessions_for_user(identity.user_id(), &page)
        .await?;
    Ok(Json(DataResponse { data: page }))
}

/// DELETE /api/v1/sessions/{id}
///
/// Revoke one of the caller's own sessions. Another user's session is a 403
/// and is left in place.
pub async fn revoke(
    State(state): State<AppState>,
    identity: RequestIdentity,
    Path(id): Path<SessionId>,
) -> AppResult<StatusCode> {
    let target = state.sessions.get_session(id).await?;

    if target.user_id != identity.user_id() {
        tracing::warn!(
            session_id = %id,
            user_id = %identity.user_id(),
            "Refused to revoke another user's session"
        );
        return Err(AppError::Core(CoreError::Forbidden(
            "Session belongs to another user".into(),
        )));
    }

    state.sessions.delete_session(id).await?;

    tracing::info!(session_id = %id, user_id = %identity.user_id(), "Session revoked");

    Ok(StatusCode::NO_CONTENT)
}
