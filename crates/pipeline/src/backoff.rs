//! Full-jitter upload backoff.
//!
//! The first ten consecutive failures retry immediately: transient
//! throttling resolves quickly and the batch queue is the real buffer.
//! Past that, each retry sleeps a uniformly random time in a window that
//! doubles per failure and is capped at 30 seconds.

use std::time::Duration;

use rand::Rng;

/// Failures tolerated before any delay kicks in.
const MIN_ATTEMPTS: u64 = 10;

/// Hard ceiling on the backoff window.
const CAP_SECONDS: i32 = 30;

/// Upper bound of the backoff window for the given failure streak.
///
/// Zero for streaks of up to [`MIN_ATTEMPTS`]; then `2^(streak-10)`
/// seconds, clamped against both signed 32-bit overflow and the cap.
pub fn max_delay(failed_attempts: u64) -> Duration {
    if failed_attempts <= MIN_ATTEMPTS {
        return Duration::ZERO;
    }
    let exponent = failed_attempts - MIN_ATTEMPTS;
    let window = if exponent >= 31 {
        i32::MAX / 2
    } else {
        1i32 << exponent
    };
    Duration::from_secs(window.min(CAP_SECONDS) as u64)
}

/// Uniformly random delay in `[0, max_delay(failed_attempts))`.
pub fn jittered_delay(failed_attempts: u64) -> Duration {
    let window = max_delay(failed_attempts);
    if window.is_zero() {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..window.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_delay_through_min_attempts() {
        for attempt in 0..=10 {
            assert_eq!(max_delay(attempt), Duration::ZERO, "attempt {attempt}");
            assert_eq!(jittered_delay(attempt), Duration::ZERO);
        }
    }

    #[test]
    fn test_window_doubles_past_floor() {
        assert_eq!(max_delay(11), Duration::from_secs(2));
        assert_eq!(max_delay(12), Duration::from_secs(4));
        assert_eq!(max_delay(13), Duration::from_secs(8));
        assert_eq!(max_delay(14), Duration::from_secs(16));
    }

    #[test]
    fn test_window_capped_at_thirty_seconds() {
        assert_eq!(max_delay(15), Duration::from_secs(30));
        assert_eq!(max_delay(20), Duration::from_secs(30));
        // Exponents past the i32 range clamp instead of overflowing.
        assert_eq!(max_delay(41), Duration::from_secs(30));
        assert_eq!(max_delay(u64::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_in_window() {
        for _ in 0..1000 {
            let delay = jittered_delay(12);
            assert!(delay < Duration::from_secs(4), "delay {delay:?}");
        }
        for _ in 0..1000 {
            let delay = jittered_delay(40);
            assert!(delay < Duration::from_secs(30), "delay {delay:?}");
        }
    }
}
