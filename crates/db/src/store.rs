//! Store traits consumed by the API layer.
//!
//! Both traits are object safe so the application can hold
//! `Arc<dyn SessionStore>` and swap the Postgres implementation for the
//! in-memory one in tests.

use std::str::FromStr;

use async_trait::async_trait;
use stormhead_core::pagination::{Page, PageRequest};
use stormhead_core::types::{SessionId, Timestamp, UserId};

use crate::error::StoreError;
use crate::models::session::{CreateSession, Session};
use crate::models::user::{CreateUser, User};

/// What to do when a login arrives from a (user, user agent, ip) triple that
/// already has a live session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FingerprintPolicy {
    /// Create another session.
    #[default]
    Allow,
    /// Fail with [`StoreError::DuplicateFingerprint`]. Enforced atomically by
    /// the store, so concurrent logins cannot both succeed.
    ///
    /// Only sessions created under this policy count. A persistent store that
    /// previously ran with [`FingerprintPolicy::Allow`] does not treat those
    /// older sessions as conflicts.
    Reject,
}

impl FromStr for FingerprintPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(FingerprintPolicy::Allow),
            "reject" => Ok(FingerprintPolicy::Reject),
            other => Err(format!(
                "unknown fingerprint policy '{other}' (expected 'allow' or 'reject')"
            )),
        }
    }
}

/// Durable record of who is logged in, and from where.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session with a fresh, never-reused id. Both timestamps are set to now.
    async fn create_session(&self, input: &CreateSession) -> Result<Session, StoreError>;

    /// Fetch a session, failing with [`StoreError::SessionNotFound`] if it was
    /// never created or has been deleted.
    async fn get_session(&self, id: SessionId) -> Result<Session, StoreError>;

    /// Bump the session's last-activity timestamp.
    async fn touch_session(&self, id: SessionId) -> Result<(), StoreError>;

    async fn delete_session(&self, id: SessionId) -> Result<(), StoreError>;

    /// One page of the user's sessions, newest first.
    async fn list_sessions_for_user(
        &self,
        user_id: UserId,
        page: &PageRequest,
    ) -> Result<Page<Session>, StoreError>;

    /// Delete sessions idle since before `cutoff`. Returns how many were removed.
    async fn purge_idle(&self, cutoff: Timestamp) -> Result<u64, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// User lookups needed by registration and login.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] if the name or e-mail is taken.
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError>;

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}
