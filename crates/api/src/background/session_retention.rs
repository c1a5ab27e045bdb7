//! Periodic purge of idle sessions.
//!
//! A session whose last activity is older than the refresh token lifetime can
//! no longer be refreshed, and any access token for it has long expired, so
//! the row is dead weight. This task deletes such rows on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use stormhead_core::clock::Clock;
use stormhead_db::{SessionStore, StoreError};
use tokio_util::sync::CancellationToken;

/// Delete every session idle for longer than `max_idle`. Returns the count.
pub async fn purge_once(
    sessions: &dyn SessionStore,
    clock: &dyn Clock,
    max_idle: chrono::Duration,
) -> Result<u64, StoreError> {
    let cutoff = clock.now() - max_idle;
    sessions.purge_idle(cutoff).await
}

/// Run the retention loop until `cancel` is triggered.
pub async fn run(
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    max_idle: chrono::Duration,
    every: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        max_idle_secs = max_idle.num_seconds(),
        interval_secs = every.as_secs(),
        "Session retention job started"
    );

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session retention job stopping");
                break;
            }
            _ = interval.tick() => {
                match purge_once(sessions.as_ref(), clock.as_ref(), max_idle).await {
                    Ok(0) => tracing::debug!("Session retention: no sessions to purge"),
                    Ok(deleted) => {
                        tracing::info!(deleted, "Session retention: purged idle sessions")
                    }
                    Err(e) => tracing::error!(error = %e, "Session retention: purge failed"),
                }
            }
        }
    }
}
