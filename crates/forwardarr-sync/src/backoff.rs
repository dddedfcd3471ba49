//! Exponential backoff for the startup connection window
//!
//! The delay before the next attempt doubles from `base`, but never
//! overshoots what is left of the window: once a doubled delay would use up
//! more than half of the remaining time, the whole remainder is returned so
//! the final attempt lands right at the deadline.

use std::time::Duration;

/// Delay to wait after attempt number `attempt` (1-based).
///
/// Returns zero for attempt 0 or when `base` or `remaining` is zero.
pub fn exponential_backoff_delay(attempt: u32, base: Duration, remaining: Duration) -> Duration {
    if attempt == 0 || base.is_zero() || remaining.is_zero() {
        return Duration::ZERO;
    }

    let mut delay = base;
    for _ in 1..attempt {
        if delay >= remaining || delay > remaining / 2 {
            return remaining;
        }
        delay = delay.saturating_mul(2);
    }

    delay.min(remaining)
}

/// Number of attempts that fit in `timeout` under
/// [`exponential_backoff_delay`], used for logging.
///
/// Always at least 1.
pub fn max_attempts(base: Duration, timeout: Duration) -> u32 {
    if base.is_zero() || timeout.is_zero() {
        return 1;
    }

    let mut attempts = 1;
    let mut remaining = timeout;
    loop {
        let sleep = exponential_backoff_delay(attempts, base, remaining);
        if sleep.is_zero() || sleep >= remaining {
            return attempts;
        }
        remaining -= sleep;
        attempts += 1;
    }
}
