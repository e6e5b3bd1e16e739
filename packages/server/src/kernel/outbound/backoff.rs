//! Retry backoff policy.

use chrono::Duration;

const MAX_DELAY_MINUTES: i64 = 60;

/// Delay before the next attempt, given the post-increment retry count.
///
/// Doubles per retry (first retry waits 2 minutes) and caps at one hour,
/// which the curve reaches on the sixth retry.
pub fn retry_delay(retry_count: i32) -> Duration {
    let exponent = retry_count.clamp(0, 30) as u32;
    let minutes = 2i64.saturating_pow(exponent).min(MAX_DELAY_MINUTES);
    Duration::minutes(minutes)
}
