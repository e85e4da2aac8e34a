//! Retry backoff arithmetic.

use std::time::Duration;

use rand::Rng;

/// Largest exponent applied to the base delay; beyond this the delay has
/// long since hit any realistic cap.
const MAX_SHIFT: u32 = 20;

/// Computes the delay before the retry following `attempt`.
///
/// The delay doubles per attempt starting from `base` and carries full
/// positive jitter: `delay(n) ∈ [base·2^(n-1), 2·base·2^(n-1))`, clamped to
/// `max`. Attempts are 1-based.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;

    let shift = attempt.saturating_sub(1).min(MAX_SHIFT);
    let exp_ms = base_ms.saturating_mul(1u64 << shift).min(max_ms);

    let jitter = if exp_ms > 0 {
        rand::thread_rng().gen_range(0..exp_ms)
    } else {
        0
    };

    Duration::from_millis(exp_ms.saturating_add(jitter).min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(1000);
    const MAX: Duration = Duration::from_millis(30_000);

    #[test]
    fn test_first_attempt_bounds() {
        for _ in 0..100 {
            let delay = backoff_delay(1, BASE, MAX).as_millis() as u64;
            assert!((1000..2000).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn test_third_attempt_bounds() {
        for _ in 0..100 {
            let delay = backoff_delay(3, BASE, MAX).as_millis() as u64;
            assert!((4000..8000).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn test_large_attempts_clamp_to_max() {
        for attempt in [10, 20, 100, u32::MAX] {
            let delay = backoff_delay(attempt, BASE, MAX);
            assert_eq!(delay, MAX);
        }
    }

    #[test]
    fn test_zero_base_yields_zero() {
        let delay = backoff_delay(1, Duration::ZERO, MAX);
        assert_eq!(delay, Duration::ZERO);
    }
}
