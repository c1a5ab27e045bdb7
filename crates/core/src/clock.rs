//! Wall-clock source.
//!
//! Expiration arithmetic and row timestamps are read through [`Clock`] so
//! that tests can pin or advance time without sleeping.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{Duration, TimeZone, Utc};

use crate::types::Timestamp;

/// A source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The real UTC wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Stored with microsecond precision, which matches what Postgres keeps for
/// `TIMESTAMPTZ` columns.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            micros: AtomicI64::new(start.timestamp_micros()),
        }
    }

    /// Start at the given unix second.
    pub fn at_unix(secs: i64) -> Self {
        Self {
            micros: AtomicI64::new(secs * 1_000_000),
        }
    }

    pub fn set(&self, instant: Timestamp) {
        self.micros
            .store(instant.timestamp_micros(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let delta = by.num_microseconds().unwrap_or(i64::MAX);
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let micros = self.micros.load(Ordering::SeqCst);
        Utc.timestamp_micros(micros)
            .single()
            .unwrap_or_else(Utc::now)
    }
}
