//! Linear backoff.

use std::time::Duration;

/// Delay before the attempt following failed attempt number `attempt`.
///
/// Attempt N waits N units, so three attempts at a 1000ms unit sleep
/// 1000ms and then 2000ms.
pub fn linear_backoff(attempt: u32, base_ms: u64) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(u64::from(attempt)))
}
