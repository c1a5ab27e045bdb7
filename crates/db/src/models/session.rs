//! Session model and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use stormhead_core::pagination::{CursorKey, HasCursorKey};
use stormhead_core::types::{SessionId, Timestamp, UserId};

/// A row from the `sessions` table: one successful login.
///
/// `updated_at` is the last-activity timestamp, bumped on every authorized
/// request.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub user_agent: String,
    pub ip_address: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl HasCursorKey for Session {
    fn cursor_key(&self) -> CursorKey {
        CursorKey {
            created_at: self.created_at,
            id: self.id,
        }
    }
}

/// DTO for creating a new session. The id and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub user_id: UserId,
    pub user_agent: String,
    pub ip_address: String,
}
