//! Wall-clock helpers.
//!
//! The temporal columns (`transaction_time`, `created_at`, `modified_at`)
//! are milliseconds since the Unix epoch. Centralising the clock read here
//! keeps every durability-facing crate on a single `now_*()` helper.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time, in milliseconds since the Unix epoch.
///
/// # Panics
///
/// Panics if the system clock is set before the Unix epoch, which would
/// indicate a misconfigured host rather than a recoverable condition.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_millis_is_monotonic_enough_for_ordering() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
    }
}
