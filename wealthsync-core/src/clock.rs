//! Wall-clock version stamps.

use chrono::Utc;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Stamp for a local edit made after `previous`.
///
/// Uses the wall clock but never repeats or goes back, so edits issued within
/// one millisecond (or after the system clock stepped backwards) still order.
pub fn next_after(previous: u64) -> u64 {
    now_millis().max(previous.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_next_after_is_strictly_greater() {
        let far_future = now_millis() + 60_000;
        assert_eq!(next_after(far_future), far_future + 1);
        assert!(next_after(0) >= now_millis() - 1_000);
    }

    #[test]
    fn test_next_after_saturates() {
        assert_eq!(next_after(u64::MAX), u64::MAX);
    }
}
