//! Integration tests for the Postgres session and user stores.
//!
//! Exercises the repository layer against a real database:
//! - Session create / get / touch / delete
//! - Cursor pagination over `(created_at DESC, id DESC)`
//! - The fingerprint unique constraint under concurrent inserts
//! - Unique constraint classification for users

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use stormhead_core::pagination::PageRequest;
use stormhead_db::models::session::CreateSession;
use stormhead_db::models::user::{CreateUser, User};
use stormhead_db::postgres::{PgSessionStore, PgUserStore};
use stormhead_db::{FingerprintPolicy, SessionStore, StoreError, UserStore};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn create_user(pool: &PgPool, name: &str) -> User {
    PgUserStore::new(pool.clone())
        .create_user(&CreateUser {
            name: name.to_string(),
            email: format!("{name}@test.com"),
            password_hash: "not-a-real-hash".to_string(),
        })
        .await
        .expect("user creation should succeed")
}

fn login_from(user: &User) -> CreateSession {
    CreateSession {
        user_id: user.id,
        user_agent: "integration-test/1.0".to_string(),
        ip_address: "127.0.0.1".to_string(),
    }
}

/// Pin a session's `created_at` so ordering is deterministic.
async fn set_created_at(pool: &PgPool, id: Uuid, secs_ago: i64) {
    sqlx::query("UPDATE sessions SET created_at = $2 WHERE id = $1")
        .bind(id)
        .bind(Utc::now() - Duration::seconds(secs_ago))
        .execute(pool)
        .await
        .expect("created_at update should succeed");
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_session_lifecycle(pool: PgPool) {
    let user = create_user(&pool, "lifecycle").await;
    let store = PgSessionStore::new(pool.clone(), FingerprintPolicy::Allow);

    let session = store.create_session(&login_from(&user)).await.unwrap();
    assert_eq!(session.user_id, user.id);
    assert_eq!(session.created_at, session.updated_at);

    let fetched = store.get_session(session.id).await.unwrap();
    assert_eq!(fetched, session);

    store.touch_session(session.id).await.unwrap();
    let touched = store.get_session(session.id).await.unwrap();
    assert!(touched.updated_at >= session.updated_at);

    store.delete_session(session.id).await.unwrap();
    assert_matches!(
        store.get_session(session.id).await,
        Err(StoreError::SessionNotFound(_))
    );
    assert_matches!(
        store.delete_session(session.id).await,
        Err(StoreError::SessionNotFound(_))
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_session_ids_are_not_reused(pool: PgPool) {
    let user = create_user(&pool, "reuse").await;
    let store = PgSessionStore::new(pool, FingerprintPolicy::Allow);

    let first = store.create_session(&login_from(&user)).await.unwrap();
    store.delete_session(first.id).await.unwrap();
    let second = store.create_session(&login_from(&user)).await.unwrap();

    assert_ne!(first.id, second.id);
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_list_sessions_pages_newest_first(pool: PgPool) {
    let user = create_user(&pool, "pager").await;
    let other = create_user(&pool, "bystander").await;
    let store = PgSessionStore::new(pool.clone(), FingerprintPolicy::Allow);

    let a = store.create_session(&login_from(&user)).await.unwrap();
    let b = store.create_session(&login_from(&user)).await.unwrap();
    let c = store.create_session(&login_from(&user)).await.unwrap();
    store.create_session(&login_from(&other)).await.unwrap();
    set_created_at(&pool, a.id, 10).await;
    set_created_at(&pool, b.id, 20).await;
    set_created_at(&pool, c.id, 30).await;

    let first = store
        .list_sessions_for_user(user.id, &PageRequest::first(2))
        .await
        .unwrap();
    let ids: Vec<Uuid> = first.items.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
    assert!(first.has_more);
    assert_eq!(first.next_cursor, b.id.to_string());

    let second = store
        .list_sessions_for_user(user.id, &PageRequest::new(first.next_cursor, 2))
        .await
        .unwrap();
    let ids: Vec<Uuid> = second.items.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![c.id]);
    assert!(!second.has_more);
    assert_eq!(second.next_cursor, "");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_list_sessions_rejects_unknown_cursor(pool: PgPool) {
    let user = create_user(&pool, "badcursor").await;
    let store = PgSessionStore::new(pool, FingerprintPolicy::Allow);

    let result = store
        .list_sessions_for_user(user.id, &PageRequest::new(Uuid::new_v4().to_string(), 5))
        .await;

    assert_matches!(result, Err(StoreError::InvalidCursor(_)));
}

// ---------------------------------------------------------------------------
// Fingerprint policy
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_reject_policy_is_atomic_under_concurrency(pool: PgPool) {
    let user = create_user(&pool, "racer").await;
    let store = std::sync::Arc::new(PgSessionStore::new(pool, FingerprintPolicy::Reject));
    let input = login_from(&user);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = std::sync::Arc::clone(&store);
            let input = input.clone();
            tokio::spawn(async move { store.create_session(&input).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(StoreError::DuplicateFingerprint) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(created, 1, "exactly one concurrent login may win");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_allow_policy_permits_same_fingerprint(pool: PgPool) {
    let user = create_user(&pool, "multilogin").await;
    let store = PgSessionStore::new(pool, FingerprintPolicy::Allow);

    store.create_session(&login_from(&user)).await.unwrap();
    store.create_session(&login_from(&user)).await.unwrap();

    let page = store
        .list_sessions_for_user(user.id, &PageRequest::first(10))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_reject_policy_only_counts_locked_sessions(pool: PgPool) {
    let user = create_user(&pool, "switcher").await;
    let allow = PgSessionStore::new(pool.clone(), FingerprintPolicy::Allow);
    let reject = PgSessionStore::new(pool, FingerprintPolicy::Reject);

    // Created before the switch: holds no fingerprint lock.
    allow.create_session(&login_from(&user)).await.unwrap();

    let claimed = reject.create_session(&login_from(&user)).await.unwrap();
    let result = reject.create_session(&login_from(&user)).await;
    assert_matches!(result, Err(StoreError::DuplicateFingerprint));

    // Deleting the locking session frees the fingerprint again.
    reject.delete_session(claimed.id).await.unwrap();
    reject.create_session(&login_from(&user)).await.unwrap();
}

// ---------------------------------------------------------------------------
// Retention and users
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_purge_idle_deletes_stale_sessions(pool: PgPool) {
    let user = create_user(&pool, "idler").await;
    let store = PgSessionStore::new(pool.clone(), FingerprintPolicy::Allow);

    let stale = store.create_session(&login_from(&user)).await.unwrap();
    let fresh = store.create_session(&login_from(&user)).await.unwrap();
    sqlx::query("UPDATE sessions SET updated_at = NOW() - INTERVAL '8 days' WHERE id = $1")
        .bind(stale.id)
        .execute(&pool)
        .await
        .unwrap();

    let purged = store
        .purge_idle(Utc::now() - Duration::days(7))
        .await
        .unwrap();

    assert_eq!(purged, 1);
    assert!(store.get_session(fresh.id).await.is_ok());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_duplicate_user_email_is_conflict(pool: PgPool) {
    create_user(&pool, "taken").await;
    let users = PgUserStore::new(pool);

    let result = users
        .create_user(&CreateUser {
            name: "different".to_string(),
            email: "taken@test.com".to_string(),
            password_hash: "x".to_string(),
        })
        .await;

    assert_matches!(result, Err(StoreError::Conflict(c)) if c == "uq_users_email");
}
