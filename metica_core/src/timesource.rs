//! Wall clock abstraction used for all freshness checks, so tests can run against a
//! deterministic clock.
use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the current time as epoch seconds.
///
/// All TTL and display-window arithmetic in the SDK goes through this trait, which makes cache
/// expiry testable without sleeping.
pub trait TimeSource: Send + Sync {
    /// Current time in seconds since the Unix epoch.
    fn epoch_seconds(&self) -> i64;
}

/// [`TimeSource`] backed by [`SystemTime::now()`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn epoch_seconds(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            // Clock before 1970 means a broken environment. Zero keeps every entry stale
            // rather than panicking in library code.
            .map(|duration| duration.as_secs() as i64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
pub(crate) use fake::FakeTimeSource;
