//! Random schedule offsets

use std::time::Duration;

use rand::Rng;

/// Uniform random delay in `[0, max)`; zero when `max` is zero
pub fn random_jitter(max: Duration) -> Duration {
    let max_nanos = max.as_nanos().min(u64::MAX as u128) as u64;
    if max_nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..max_nanos))
}

/// `base` plus a uniform random delay in `[0, jitter)`
pub fn jittered(base: Duration, jitter: Duration) -> Duration {
    base + random_jitter(jitter)
}
