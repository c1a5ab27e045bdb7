use stormhead_core::pagination::InvalidCursor;
use stormhead_core::types::SessionId;

/// PostgreSQL `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Constraint that enforces the "reject" fingerprint policy.
pub const FINGERPRINT_CONSTRAINT: &str = "uq_sessions_fingerprint_lock";

/// Errors surfaced by [`SessionStore`](crate::SessionStore) and
/// [`UserStore`](crate::UserStore) implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("an active session already exists for this client fingerprint")]
    DuplicateFingerprint,

    #[error("duplicate value violates unique constraint: {0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidCursor(#[from] InvalidCursor),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                match db_err.constraint() {
                    Some(FINGERPRINT_CONSTRAINT) => return StoreError::DuplicateFingerprint,
                    Some(constraint) if constraint.starts_with("uq_") => {
                        return StoreError::Conflict(constraint.to_string())
                    }
                    _ => {}
                }
            }
        }
        StoreError::Unavailable(err.to_string())
    }
}
