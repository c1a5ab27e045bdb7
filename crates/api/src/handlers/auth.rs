//! Handlers for the `/auth` resource (availability checks, register, login,
//! refresh, logout).

use std::net::SocketAddr;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::{FromRequestParts, State};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use stormhead_core::error::CoreError;
use stormhead_core::types::SessionId;
use stormhead_db::models::session::CreateSession;
use stormhead_db::models::user::{CreateUser, User, UserResponse};
use stormhead_db::StoreError;
use validator::Validate;

use crate::auth::identity::RequestIdentity;
use crate::auth::password::{hash_password, verify_against_dummy, verify_password};
use crate::error::{AppError, AppResult, UNAUTHENTICATED_MESSAGE};
use crate::response::DataResponse;
use crate::state::AppState;

/// Recorded when the peer address or user agent is not available.
const UNKNOWN: &str = "unknown";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/validate-name`.
#[derive(Debug, Deserialize, Validate)]
pub struct ValidateNameRequest {
    #[validate(length(min = 5, message = "name must be at least 5 characters"))]
    pub name: String,
}

/// Request body for `POST /auth/validate-email`.
#[derive(Debug, Deserialize, Validate)]
pub struct ValidateEmailRequest {
    #[validate(email(message = "email is not a valid address"))]
    pub email: String,
}

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 5, message = "name must be at least 5 characters"))]
    pub name: String,
    #[validate(email(message = "email is not a valid address"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for `POST /auth/refresh`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Successful authentication response returned by login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Where a login came from: the `User-Agent` header and the peer address.
#[derive(Debug, Clone)]
pub struct ClientFingerprint {
    pub user_agent: String,
    pub ip_address: String,
}

impl<S> FromRequestParts<S> for ClientFingerprint
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string();

        // Forwarding headers are client-controlled, so only the socket peer counts.
        let ip_address = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|_| UNKNOWN.to_string());

        Ok(ClientFingerprint {
            user_agent,
            ip_address,
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/validate-name
///
/// 204 if `name` is acceptable and not taken, 400 otherwise.
pub async fn validate_name(
    State(state): State<AppState>,
    Json(input): Json<ValidateNameRequest>,
) -> AppResult<StatusCode> {
    input.validate()?;

    if state.users.find_user_by_name(&input.name).await?.is_some() {
        return Err(AppError::Core(CoreError::Validation(
            "name already exists".into(),
        )));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/auth/validate-email
///
/// 204 if `email` is acceptable and not taken, 400 otherwise.
pub async fn validate_email(
    State(state): State<AppState>,
    Json(input): Json<ValidateEmailRequest>,
) -> AppResult<StatusCode> {
    input.validate()?;

    if state.users.find_user_by_email(&input.email).await?.is_some() {
        return Err(AppError::Core(CoreError::Validation(
            "email already exists".into(),
        )));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/auth/register
///
/// Create an account. Returns 201 with the public user record.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    input.validate()?;

    if state.users.find_user_by_name(&input.name).await?.is_some() {
        return Err(AppError::Core(CoreError::Conflict("name already exists".into())));
    }
    if state.users.find_user_by_email(&input.email).await?.is_some() {
        return Err(AppError::Core(CoreError::Conflict("email already exists".into())));
    }

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    // A concurrent registration can still win the race; the unique
    // constraints turn that into a 409 as well.
    let user = state
        .users
        .create_user(&CreateUser {
            name: input.name,
            email: input.email,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UserResponse::from(&user),
        }),
    ))
}

/// POST /api/v1/auth/login
///
/// Authenticate with e-mail + password. Creates a session and returns a
/// token pair bound to it.
pub async fn login(
    State(state): State<AppState>,
    client: ClientFingerprint,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let Some(user) = state.users.find_user_by_email(&input.email).await? else {
        verify_against_dummy(&input.password);
        return Err(invalid_credentials());
    };

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;

    if !password_valid {
        tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(invalid_credentials());
    }

    let session = state
        .sessions
        .create_session(&CreateSession {
            user_id: user.id,
            user_agent: client.user_agent,
            ip_address: client.ip_address,
        })
        .await?;

    tracing::info!(session_id = %session.id, user_id = %user.id, "Session created");

    Ok(Json(auth_response(&state, session.id, &user)?))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a refresh token for a new pair bound to the same session. Fails
/// with 401 once the session has been deleted, however fresh the token.
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let session_id = state.tokens.parse_refresh_token(&input.refresh_token)?;

    let session = state
        .sessions
        .get_session(session_id)
        .await
        .map_err(session_gone_is_unauthorized)?;
    state
        .sessions
        .touch_session(session_id)
        .await
        .map_err(session_gone_is_unauthorized)?;

    let user = state
        .users
        .find_user_by_id(session.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("User no longer exists".into())))?;

    tracing::debug!(session_id = %session.id, "Tokens refreshed");

    Ok(Json(auth_response(&state, session.id, &user)?))
}

/// POST /api/v1/auth/logout
///
/// Delete the caller's session, invalidating both of its tokens. Returns 204.
pub async fn logout(
    State(state): State<AppState>,
    identity: RequestIdentity,
) -> AppResult<StatusCode> {
    match state.sessions.delete_session(identity.session_id()).await {
        // Already gone (e.g. revoked from another device) is the same outcome.
        Ok(()) | Err(StoreError::SessionNotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    tracing::info!(
        session_id = %identity.session_id(),
        user_id = %identity.user_id(),
        "Session logged out"
    );

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn invalid_credentials() -> AppError {
    AppError::Core(CoreError::Unauthorized("Invalid email or password".into()))
}

fn session_gone_is_unauthorized(err: StoreError) -> AppError {
    match err {
        StoreError::SessionNotFound(id) => {
            tracing::debug!(session_id = %id, "Refresh rejected: session no longer exists");
            AppError::Core(CoreError::Unauthorized(UNAUTHENTICATED_MESSAGE.into()))
        }
        other => other.into(),
    }
}

fn auth_response(state: &AppState, session_id: SessionId, user: &User) -> AppResult<AuthResponse> {
    let pair = state.tokens.generate_pair(session_id)?;

    Ok(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: state.tokens.access_ttl().num_seconds(),
        user: UserResponse::from(user),
    })
}
