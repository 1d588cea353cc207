//! Exponential backoff shared by reconnects, busy retries and recovery.

use std::time::Duration;

use rand::Rng;

/// `min(base * 2^exponent, cap)`, saturating instead of overflowing.
pub fn exponential(base: Duration, exponent: u32, cap: Duration) -> Duration {
    let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(cap)
}

/// Reconnect delay: `min(base * 2^attempts + jitter, cap)`.
pub fn with_jitter(base: Duration, attempts: u32, jitter: Duration, cap: Duration) -> Duration {
    exponential(base, attempts, Duration::MAX)
        .saturating_add(jitter)
        .min(cap)
}

/// Uniform random jitter in `[0, max)`.
pub fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..max_ms))
}
