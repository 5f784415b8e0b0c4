//! Tally - Metrics
//!
//! Self-telemetry for the metric pipeline: counters kept by inputs,
//! outputs, aggregators and the flush dispatcher, plus a periodic reporter.
//!
//! # Design Principles
//!
//! - **Lock-free updates**: all counters are relaxed atomics
//! - **Overload is counted, not logged**: buffer eviction and skipped flushes
//!   only bump counters
//! - **Trait-based**: components expose snapshots through provider traits
//!
//! # Metrics Handle Pattern
//!
//! Components keep `Arc<...Metrics>` internally and hand out a
//! `metrics_handle()` implementing the matching provider trait. Handles are
//! registered on a shared [`MetricsHub`], which both the reporter and the
//! `internal` input read from.
//!
//! ```text
//! RunningOutput (owns Arc<OutputMetrics>)
//!     └──► metrics_handle() ──► hub.add_output(handle)
//!
//! UnifiedReporter ──► hub.collect() every interval ──► tracing::info!
//! internal input  ──► hub.collect() every gather   ──► metrics
//! ```

mod collected;
pub mod format;
mod hub;
mod reporter;
mod traits;

pub use collected::{CollectedMetrics, InputRates, MetricsRates, Named, OutputRates};
pub use format::{HumanFormatter, JsonFormatter, MetricsFormatter};
pub use hub::MetricsHub;
pub use reporter::{UnifiedReporter, UnifiedReporterBuilder};
pub use traits::{
    AggregatorMetrics, AggregatorMetricsProvider, AggregatorMetricsSnapshot, DispatcherMetrics,
    DispatcherMetricsProvider, DispatcherSnapshot, InputMetrics, InputMetricsProvider,
    InputMetricsSnapshot, OutputMetrics, OutputMetricsProvider, OutputMetricsSnapshot,
};

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter wrapper for convenient metric operations
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Create a new counter initialized to 0
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increment the counter by `val` (relaxed ordering for performance)
    #[inline]
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Increment the counter by 1
    #[inline]
    pub fn inc(&self) {
        self.add(1);
    }

    /// Get the current value (relaxed ordering)
    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        counter.inc();
        counter.add(4);
        assert_eq!(counter.get(), 5);
    }
}
