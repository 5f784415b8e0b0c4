//! Timestamp precision
//!
//! Without an explicit setting, polled inputs truncate timestamps to the
//! order of magnitude of their interval, capped at one second. Service
//! inputs keep full resolution unless configured.

use std::time::Duration;

/// Precision implied by a collection interval
///
/// | interval | precision |
/// |----------|-----------|
/// | >= 1s    | 1s        |
/// | >= 1ms   | 1ms       |
/// | >= 1µs   | 1µs       |
/// | < 1µs    | none      |
pub fn derive_precision(interval: Duration) -> Option<Duration> {
    [
        Duration::from_secs(1),
        Duration::from_millis(1),
        Duration::from_micros(1),
    ]
    .into_iter()
    .find(|step| interval >= *step)
}

/// Resolve the precision an input applies
///
/// An explicit zero disables truncation.
pub fn effective_precision(
    explicit: Option<Duration>,
    interval: Duration,
    is_service: bool,
) -> Option<Duration> {
    match explicit {
        Some(p) if p.is_zero() => None,
        Some(p) => Some(p),
        None if is_service => None,
        None => derive_precision(interval),
    }
}
