//! Session gate applied to every request outside the public allow-list.
//!
//! For a guarded request the gate runs, in order and without skipping:
//!
//! 1. Extract the `Authorization: Bearer <token>` credential.
//! 2. Verify it as an access token.
//! 3. Load the session it names. A deleted session is treated exactly like a
//!    forged token, so revocation takes effect on the very next request.
//! 4. Bump the session's activity timestamp. A store fault here fails the
//!    request; the handler does not run.
//! 5. Attach a [`RequestIdentity`] to the request extensions.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use stormhead_core::types::SessionId;
use stormhead_db::{SessionStore, StoreError};

use crate::auth::identity::RequestIdentity;
use crate::auth::token::{TokenError, TokenIssuer};
use crate::error::AppError;

const BEARER_PREFIX: &str = "Bearer ";

/// Why the gate refused a request.
///
/// Every variant except [`GateError::StoreUnavailable`] reaches the client
/// as the same 401; the distinction is only logged.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("missing Authorization header")]
    CredentialMissing,

    #[error("Authorization header is not a bearer credential")]
    CredentialMalformed,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),
}

impl GateError {
    fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::SessionNotFound(id) => GateError::SessionNotFound(id),
            other => GateError::StoreUnavailable(other.to_string()),
        }
    }
}

/// Turns a bearer credential into a [`RequestIdentity`].
#[derive(Clone)]
pub struct AuthorizationGate {
    tokens: Arc<TokenIssuer>,
    sessions: Arc<dyn SessionStore>,
    public_operations: Arc<HashSet<String>>,
}

impl AuthorizationGate {
    pub fn new<I, P>(
        tokens: Arc<TokenIssuer>,
        sessions: Arc<dyn SessionStore>,
        public_operations: I,
    ) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            tokens,
            sessions,
            public_operations: Arc::new(public_operations.into_iter().map(Into::into).collect()),
        }
    }

    /// Exact match against the allow-list. No prefix or pattern matching.
    pub fn is_public(&self, path: &str) -> bool {
        self.public_operations.contains(path)
    }

    pub async fn authorize(&self, headers: &HeaderMap) -> Result<RequestIdentity, GateError> {
        let header = headers
            .get(AUTHORIZATION)
            .ok_or(GateError::CredentialMissing)?;
        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .ok_or(GateError::CredentialMalformed)?;

        let session_id = self.tokens.parse_access_token(token)?;

        let session = self
            .sessions
            .get_session(session_id)
            .await
            .map_err(GateError::from_store)?;

        self.sessions
            .touch_session(session_id)
            .await
            .map_err(GateError::from_store)?;

        Ok(RequestIdentity::new(session.id, session.user_id))
    }
}

/// Axum middleware wrapping the whole router with the [`AuthorizationGate`].
///
/// Mount with `axum::middleware::from_fn_with_state(gate, require_session)` on
/// the outermost router so the request path seen here is the full path.
pub async fn require_session(
    State(gate): State<AuthorizationGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if gate.is_public(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let identity = gate.authorize(request.headers()).await.map_err(|err| {
        let path = request.uri().path();
        match &err {
            GateError::StoreUnavailable(_) => {
                tracing::error!(error = %err, path = %path, "Session gate store fault");
            }
            _ => {
                tracing::debug!(reason = %err, path = %path, "Rejected credential");
            }
        }
        AppError::Gate(err)
    })?;

    tracing::debug!(
        session_id = %identity.session_id(),
        user_id = %identity.user_id(),
        "Request authorized"
    );

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
