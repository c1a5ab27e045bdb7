//! Persistence for users and sessions.
//!
//! - [`repositories`] -- zero-sized `*Repo` structs issuing SQL against `&PgPool`.
//! - [`store`] -- the [`SessionStore`] / [`UserStore`] traits the API consumes.
//! - [`postgres`] -- trait implementations backed by the repositories.
//! - [`memory`] -- in-process implementations for tests and database-less runs.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repositories;
pub mod store;

use sqlx::postgres::PgPoolOptions;

pub use error::StoreError;
pub use store::{FingerprintPolicy, SessionStore, UserStore};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the pool can reach the database.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the migrations bundled in `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
