//! Postgres-backed store implementations.

use async_trait::async_trait;
use stormhead_core::pagination::{paginate, CursorKey, CursorSource, Page, PageRequest};
use stormhead_core::types::{SessionId, Timestamp, UserId};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::session::{CreateSession, Session};
use crate::models::user::{CreateUser, User};
use crate::repositories::{SessionRepo, UserRepo};
use crate::store::{FingerprintPolicy, SessionStore, UserStore};
use crate::DbPool;

/// [`SessionStore`] over the `sessions` table.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: DbPool,
    policy: FingerprintPolicy,
}

impl PgSessionStore {
    pub fn new(pool: DbPool, policy: FingerprintPolicy) -> Self {
        Self { pool, policy }
    }
}

/// One user's sessions as a pagination source.
struct UserSessions<'a> {
    pool: &'a DbPool,
    user_id: UserId,
}

#[async_trait]
impl<'a> CursorSource for UserSessions<'a> {
    type Item = Session;
    type Error = StoreError;

    async fn resolve_cursor(&self, id: Uuid) -> Result<Option<CursorKey>, StoreError> {
        Ok(SessionRepo::find_cursor_key(self.pool, self.user_id, id).await?)
    }

    async fn fetch_after(
        &self,
        after: Option<CursorKey>,
        count: i64,
    ) -> Result<Vec<Session>, StoreError> {
        Ok(SessionRepo::list_for_user(self.pool, self.user_id, after, count).await?)
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(&self, input: &CreateSession) -> Result<Session, StoreError> {
        let lock = self.policy == FingerprintPolicy::Reject;
        Ok(SessionRepo::create(&self.pool, input, lock).await?)
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StoreError> {
        SessionRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or(StoreError::SessionNotFound(id))
    }

    async fn touch_session(&self, id: SessionId) -> Result<(), StoreError> {
        if SessionRepo::touch(&self.pool, id).await? {
            Ok(())
        } else {
            Err(StoreError::SessionNotFound(id))
        }
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StoreError> {
        if SessionRepo::delete(&self.pool, id).await? {
            Ok(())
        } else {
            Err(StoreError::SessionNotFound(id))
        }
    }

    async fn list_sessions_for_user(
        &self,
        user_id: UserId,
        page: &PageRequest,
    ) -> Result<Page<Session>, StoreError> {
        let source = UserSessions {
            pool: &self.pool,
            user_id,
        };
        paginate(&source, page).await
    }

    async fn purge_idle(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        Ok(SessionRepo::delete_idle_before(&self.pool, cutoff).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}

/// [`UserStore`] over the `users` table.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, input: &CreateUser) -> Result<User, StoreError> {
        Ok(UserRepo::create(&self.pool, input).await?)
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_name(&self.pool, name).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_email(&self.pool, email).await?)
    }
}
