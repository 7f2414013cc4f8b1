//! Freshness rules for cache entries

use std::time::Duration;

/// Whether an entry written at `stored_at_ms` with `ttl` is still usable at `now_ms`.
///
/// Fresh iff `now - stored_at <= ttl`. An entry stamped in the future (clock
/// moved backwards) counts as fresh.
pub fn is_fresh(stored_at_ms: i64, ttl: Duration, now_ms: i64) -> bool {
    let age = now_ms.saturating_sub(stored_at_ms);
    age <= ttl_ms(ttl)
}

/// Age of an entry in milliseconds, clamped at zero.
pub fn age_ms(stored_at_ms: i64, now_ms: i64) -> u64 {
    now_ms.saturating_sub(stored_at_ms).max(0) as u64
}

/// Duration as signed milliseconds, saturating.
pub fn ttl_ms(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}
