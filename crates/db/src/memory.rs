//! In-process store implementations.
//!
//! Used by the API integration tests and for running the server without a
//! database. Every operation takes the store's single lock, so the
//! fingerprint check and insert in [`MemorySessionStore::create_session`]
//! are one atomic step. The policy is fixed for the store's lifetime, so under
//! `Reject` every stored row holds its fingerprint.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use stormhead_core::clock::Clock;
use stormhead_core::pagination::{
    paginate, CursorKey, CursorSource, HasCursorKey, Page, PageRequest,
};
use stormhead_core::types::{SessionId, Timestamp, UserId};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{StoreError, FINGERPRINT_CONSTRAINT};
use crate::models::session::{CreateSession, Session};
use crate::models::user::{CreateUser, User};
use crate::store::{FingerprintPolicy, SessionStore, UserStore};

/// [`SessionStore`] held in a `HashMap`.
pub struct MemorySessionStore {
    clock: Arc<dyn Clock>,
    policy: FingerprintPolicy,
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>, policy: FingerprintPolicy) -> Self {
        Self {
            clock,
            policy,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

struct UserSessions<'a> {
    sessions: &'a HashMap<SessionId, Session>,
    user_id: UserId,
}

#[async_trait]
impl<'a> CursorSource for UserSessions<'a> {
    type Item = Session;
    type Error = StoreError;

    async fn resolve_cursor(&self, id: Uuid) -> Result<Option<CursorKey>, StoreError> {
        Ok(self
            .sessions
            .get(&id)
            .filter(|s| s.user_id == self.user_id)
            .map(HasCursorKey::cursor_key))
    }

    async fn fetch_after(
        &self,
        after: Option<CursorKey>,
        count: i64,
    ) -> Result<Vec<Session>, StoreError> {
        let mut rows: Vec<Session> = self
            .sessions
            .values()
            .filter(|s| s.user_id == self.user_id)
            .filter(|s| after.map_or(true, |a| s.cursor_key().is_after(&a)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows.truncate(usize::try_from(count).unwrap_or(0));
        Ok(rows)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, input: &CreateSession) -> Result<Session, StoreError> {
        let mut sessions = self.sessions.lock().await;

        if self.policy == FingerprintPolicy::Reject {
            let taken = sessions.values().any(|s| {
                s.user_id == input.user_id
                    && s.user_agent == input.user_agent
                    && s.ip_address == input.ip_address
            });
            if taken {
                tracing::debug!(
                    user_id = %input.user_id,
                    constraint = FINGERPRINT_CONSTRAINT,
                    "Rejecting duplicate session fingerprint"
                );
                return Err(StoreError::DuplicateFingerprint);
            }
        }

        // v4 collisions are not expected; the loop keeps ids unique regardless.
        let mut id = Uuid::new_v4();
        while sessions.contains_key(&id) {
            id = Uuid::new_v4();
        }

        let now = self.clock.now();
        let session = Session {
            id,
            user_id: input.user_id,
            user_agent: input.user_agent.clone(),
            ip_address: input.ip_address.clone(),
            created_at: now,
            updated_at: now,
        };
        sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StoreError> {
        self.sessions
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::SessionNotFound(id))
    }

    async fn touch_session(&self, id: SessionId) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&id)
            .ok_or(StoreError::SessionNotFound(id))?;
        session.updated_at = now;
        Ok(())
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::SessionNotFound(id))
    }

    async fn list_sessions_for_user(
        &self,
        user_id: UserId,
        page: &PageRequest,
    ) -> Result<Page<Session>, StoreError> {
        let sessions = self.sessions.lock().await;
        let source = UserSessions {
            sessions: &*sessions,
            user_id,
        };
        paginate(&source, page).await
    }

    async fn purge_idle(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.updated_at >= cutoff);
        Ok((before - sessions.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// [`UserStore`] held in a `HashMap`.
pub struct MemoryUserStore {
    clock: Arc<dyn Clock>,
    users: Mutex<HashMap<UserId, User>>,
}

impl MemoryUserStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            users: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;

        if users.values().any(|u| u.name == input.name) {
            return Err(StoreError::Conflict("uq_users_name".into()));
        }
        if users.values().any(|u| u.email == input.email) {
            return Err(StoreError::Conflict("uq_users_email".into()));
        }

        let now = self.clock.now();
        let user = User {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            email: input.email.clone(),
            description: String::new(),
            password_hash: input.password_hash.clone(),
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|u| u.name == name)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Duration;
    use stormhead_core::clock::ManualClock;

    use super::*;

    fn fingerprint(user_id: UserId) -> CreateSession {
        CreateSession {
            user_id,
            user_agent: "Mozilla/5.0".into(),
            ip_address: "10.0.0.1".into(),
        }
    }

    fn store(policy: FingerprintPolicy) -> (Arc<ManualClock>, MemorySessionStore) {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let store = MemorySessionStore::new(clock.clone(), policy);
        (clock, store)
    }

    #[tokio::test]
    async fn create_sets_both_timestamps_to_now() {
        let (clock, store) = store(FingerprintPolicy::Allow);
        let session = store.create_session(&fingerprint(Uuid::new_v4())).await.unwrap();

        assert_eq!(session.created_at, clock.now());
        assert_eq!(session.updated_at, clock.now());
        assert_eq!(store.get_session(session.id).await.unwrap(), session);
    }

    #[tokio::test]
    async fn touch_bumps_only_activity_timestamp() {
        let (clock, store) = store(FingerprintPolicy::Allow);
        let session = store.create_session(&fingerprint(Uuid::new_v4())).await.unwrap();

        clock.advance(Duration::seconds(30));
        store.touch_session(session.id).await.unwrap();
        store.touch_session(session.id).await.unwrap();

        let touched = store.get_session(session.id).await.unwrap();
        assert_eq!(touched.created_at, session.created_at);
        assert_eq!(touched.updated_at, clock.now());
    }

    #[tokio::test]
    async fn deleted_session_is_not_found() {
        let (_clock, store) = store(FingerprintPolicy::Allow);
        let session = store.create_session(&fingerprint(Uuid::new_v4())).await.unwrap();

        store.delete_session(session.id).await.unwrap();

        assert_matches!(
            store.get_session(session.id).await,
            Err(StoreError::SessionNotFound(id)) if id == session.id
        );
        assert_matches!(
            store.touch_session(session.id).await,
            Err(StoreError::SessionNotFound(_))
        );
    }

    #[tokio::test]
    async fn allow_policy_permits_duplicate_fingerprints() {
        let (_clock, store) = store(FingerprintPolicy::Allow);
        let input = fingerprint(Uuid::new_v4());

        let first = store.create_session(&input).await.unwrap();
        let second = store.create_session(&input).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn reject_policy_refuses_duplicate_fingerprint() {
        let (_clock, store) = store(FingerprintPolicy::Reject);
        let input = fingerprint(Uuid::new_v4());

        store.create_session(&input).await.unwrap();
        assert_matches!(
            store.create_session(&input).await,
            Err(StoreError::DuplicateFingerprint)
        );

        // A different address is a different fingerprint.
        let mut other = input.clone();
        other.ip_address = "10.0.0.2".into();
        store.create_session(&other).await.unwrap();
    }

    #[tokio::test]
    async fn reject_policy_frees_fingerprint_after_delete() {
        let (_clock, store) = store(FingerprintPolicy::Reject);
        let input = fingerprint(Uuid::new_v4());

        let first = store.create_session(&input).await.unwrap();
        store.delete_session(first.id).await.unwrap();

        let second = store.create_session(&input).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn reject_policy_holds_under_concurrent_logins() {
        let (_clock, store) = store(FingerprintPolicy::Reject);
        let store = Arc::new(store);
        let input = fingerprint(Uuid::new_v4());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let input = input.clone();
                tokio::spawn(async move { store.create_session(&input).await })
            })
            .collect();

        let mut created = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(StoreError::DuplicateFingerprint) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(rejected, 15);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn list_pages_only_the_users_sessions() {
        let (clock, store) = store(FingerprintPolicy::Allow);
        let owner = Uuid::new_v4();

        let c = store.create_session(&fingerprint(owner)).await.unwrap();
        clock.advance(Duration::seconds(1));
        let b = store.create_session(&fingerprint(owner)).await.unwrap();
        clock.advance(Duration::seconds(1));
        let a = store.create_session(&fingerprint(owner)).await.unwrap();
        store.create_session(&fingerprint(Uuid::new_v4())).await.unwrap();

        let first = store
            .list_sessions_for_user(owner, &PageRequest::first(2))
            .await
            .unwrap();
        assert_eq!(first.items, vec![a, b.clone()]);
        assert!(first.has_more);
        assert_eq!(first.next_cursor, b.id.to_string());

        let second = store
            .list_sessions_for_user(owner, &PageRequest::new(first.next_cursor, 2))
            .await
            .unwrap();
        assert_eq!(second.items, vec![c]);
        assert!(!second.has_more);
        assert!(second.next_cursor.is_empty());
    }

    #[tokio::test]
    async fn cursor_from_another_user_is_invalid() {
        let (_clock, store) = store(FingerprintPolicy::Allow);
        let foreign = store.create_session(&fingerprint(Uuid::new_v4())).await.unwrap();

        let result = store
            .list_sessions_for_user(Uuid::new_v4(), &PageRequest::new(foreign.id.to_string(), 5))
            .await;
        assert_matches!(result, Err(StoreError::InvalidCursor(_)));
    }

    #[tokio::test]
    async fn purge_idle_removes_only_stale_sessions() {
        let (clock, store) = store(FingerprintPolicy::Allow);
        let stale = store.create_session(&fingerprint(Uuid::new_v4())).await.unwrap();
        clock.advance(Duration::days(8));
        let fresh = store.create_session(&fingerprint(Uuid::new_v4())).await.unwrap();

        let purged = store.purge_idle(clock.now() - Duration::days(7)).await.unwrap();

        assert_eq!(purged, 1);
        assert_matches!(store.get_session(stale.id).await, Err(StoreError::SessionNotFound(_)));
        assert!(store.get_session(fresh.id).await.is_ok());
    }

    #[tokio::test]
    async fn user_store_rejects_taken_name_and_email() {
        let users = MemoryUserStore::new(Arc::new(ManualClock::at_unix(0)));
        let input = CreateUser {
            name: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "hash".into(),
        };
        let created = users.create_user(&input).await.unwrap();

        let same_name = CreateUser {
            email: "other@example.com".into(),
            ..input.clone()
        };
        assert_matches!(
            users.create_user(&same_name).await,
            Err(StoreError::Conflict(c)) if c == "uq_users_name"
        );

        let same_email = CreateUser {
            name: "bob".into(),
            ..input
        };
        assert_matches!(
            users.create_user(&same_email).await,
            Err(StoreError::Conflict(c)) if c == "uq_users_email"
        );

        let found = users.find_user_by_email("alice@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));
    }
}
