//! Repository for the `sessions` table.

use sqlx::PgPool;
use stormhead_core::pagination::CursorKey;
use stormhead_core::types::{SessionId, Timestamp, UserId};
use uuid::Uuid;

use crate::models::session::{CreateSession, Session};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, user_agent, ip_address, created_at, updated_at";

/// Provides CRUD operations for sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session with a fresh id, returning the created row.
    ///
    /// With `lock_fingerprint`, the row claims the
    /// `uq_sessions_fingerprint_lock` slot for its (user, user agent, ip)
    /// triple; a concurrent insert for the same triple fails with a unique
    /// violation instead of creating a second row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateSession,
        lock_fingerprint: bool,
    ) -> Result<Session, sqlx::Error> {
        let query = format!(
            "INSERT INTO sessions (id, user_id, user_agent, ip_address, fingerprint_lock)
             VALUES ($1, $2, $3, $4,
                     CASE WHEN $5 THEN md5($2::text || E'\\n' || $3 || E'\\n' || $4) END)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(Uuid::new_v4())
            .bind(input.user_id)
            .bind(&input.user_agent)
            .bind(&input.ip_address)
            .bind(lock_fingerprint)
            .fetch_one(pool)
            .await
    }

    /// Find a session by id.
    pub async fn find_by_id(pool: &PgPool, id: SessionId) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE id = $1");
        sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Bump the last-activity timestamp. Returns `true` if the row exists.
    pub async fn touch(pool: &PgPool, id: SessionId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE sessions SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a session. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: SessionId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Resolve a pagination cursor to its ordering key, scoped to one user.
    pub async fn find_cursor_key(
        pool: &PgPool,
        user_id: UserId,
        id: SessionId,
    ) -> Result<Option<CursorKey>, sqlx::Error> {
        let row: Option<(Timestamp, Uuid)> =
            sqlx::query_as("SELECT created_at, id FROM sessions WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|(created_at, id)| CursorKey { created_at, id }))
    }

    /// List a user's sessions newest first, strictly after `after` when given.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: UserId,
        after: Option<CursorKey>,
        limit: i64,
    ) -> Result<Vec<Session>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sessions
             WHERE user_id = $1
               AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3))
             ORDER BY created_at DESC, id DESC
             LIMIT $4"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(user_id)
            .bind(after.map(|k| k.created_at))
            .bind(after.map(|k| k.id))
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Delete sessions with no activity since `cutoff`. Returns the count of deleted rows.
    pub async fn delete_idle_before(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE updated_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
