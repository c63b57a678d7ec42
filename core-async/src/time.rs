//! Time-related abstractions.
//!
//! Re-exports Tokio's timer primitives. Tests can freeze and advance this clock
//! with `tokio::time::pause` / `advance`, which is how retry backoff is
//! exercised without real sleeps.

pub use tokio::time::{interval, sleep, sleep_until, timeout, Interval, Sleep, Timeout};

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Error returned by [`timeout`] when the deadline elapses first.
pub use tokio::time::error::Elapsed;

/// Returns the current time as milliseconds since UNIX_EPOCH.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Linear backoff: `base * attempt`, capped at `max`.
///
/// `attempt` is 1-based; attempt 0 yields no delay.
pub fn linear_backoff(base: Duration, attempt: u32, max: Duration) -> Duration {
    base.saturating_mul(attempt).min(max)
}

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at `max`.
pub fn exponential_backoff(base: Duration, attempt: u32, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let factor = 2u32.saturating_pow(attempt - 1);
    base.saturating_mul(factor).min(max)
}
