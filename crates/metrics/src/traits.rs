//! Component counters and provider traits
//!
//! Each component type has an atomic counter struct, a `Copy` snapshot, and
//! a provider trait the reporter reads through.

use std::time::Duration;

use serde::Serialize;

use crate::Counter;

// ============================================================================
// Inputs
// ============================================================================

/// Counters for one configured input
#[derive(Debug, Default)]
pub struct InputMetrics {
    gathers: Counter,
    gather_errors: Counter,
    metrics_gathered: Counter,
    metrics_dropped: Counter,
    gather_time_ns: Counter,
}

impl InputMetrics {
    pub const fn new() -> Self {
        Self {
            gathers: Counter::new(),
            gather_errors: Counter::new(),
            metrics_gathered: Counter::new(),
            metrics_dropped: Counter::new(),
            gather_time_ns: Counter::new(),
        }
    }

    /// Record a completed collection and how long it took
    #[inline]
    pub fn record_gather(&self, elapsed: Duration) {
        self.gathers.inc();
        self.gather_time_ns.add(elapsed.as_nanos() as u64);
    }

    /// Record a collection error
    #[inline]
    pub fn record_error(&self) {
        self.gather_errors.inc();
    }

    /// Record a metric accepted into the pipeline
    #[inline]
    pub fn record_gathered(&self) {
        self.metrics_gathered.inc();
    }

    /// Record a metric lost because the ingest queue was full or closed
    #[inline]
    pub fn record_dropped(&self) {
        self.metrics_dropped.inc();
    }

    pub fn snapshot(&self) -> InputMetricsSnapshot {
        InputMetricsSnapshot {
            gathers: self.gathers.get(),
            gather_errors: self.gather_errors.get(),
            metrics_gathered: self.metrics_gathered.get(),
            metrics_dropped: self.metrics_dropped.get(),
            gather_time_ns: self.gather_time_ns.get(),
        }
    }
}

/// Point-in-time snapshot of input counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InputMetricsSnapshot {
    pub gathers: u64,
    pub gather_errors: u64,
    pub metrics_gathered: u64,
    pub metrics_dropped: u64,
    pub gather_time_ns: u64,
}

/// Implemented by input metrics handles
pub trait InputMetricsProvider: Send + Sync {
    /// Instance id
    fn input_id(&self) -> &str;

    /// Plugin name (e.g. "cpu", "file")
    fn input_type(&self) -> &str;

    fn snapshot(&self) -> InputMetricsSnapshot;
}

// ============================================================================
// Outputs
// ============================================================================

/// Counters for one configured output, summed over its destinations
#[derive(Debug, Default)]
pub struct OutputMetrics {
    metrics_added: Counter,
    metrics_filtered: Counter,
    metrics_dropped: Counter,
    metrics_written: Counter,
    batches_written: Counter,
    write_errors: Counter,
    write_time_ns: Counter,
    destinations: Counter,
}

impl OutputMetrics {
    pub const fn new() -> Self {
        Self {
            metrics_added: Counter::new(),
            metrics_filtered: Counter::new(),
            metrics_dropped: Counter::new(),
            metrics_written: Counter::new(),
            batches_written: Counter::new(),
            write_errors: Counter::new(),
            write_time_ns: Counter::new(),
            destinations: Counter::new(),
        }
    }

    /// Record a metric added to a destination buffer
    #[inline]
    pub fn record_added(&self) {
        self.metrics_added.inc();
    }

    /// Record a metric rejected by the output's filter
    #[inline]
    pub fn record_filtered(&self) {
        self.metrics_filtered.inc();
    }

    /// Record metrics evicted from a full buffer
    #[inline]
    pub fn record_dropped(&self, count: u64) {
        self.metrics_dropped.add(count);
    }

    /// Record a successful write
    #[inline]
    pub fn record_written(&self, metrics: u64, elapsed: Duration) {
        self.batches_written.inc();
        self.metrics_written.add(metrics);
        self.write_time_ns.add(elapsed.as_nanos() as u64);
    }

    /// Record a failed write
    #[inline]
    pub fn record_error(&self) {
        self.write_errors.inc();
    }

    /// Record a destination created for this output
    #[inline]
    pub fn record_destination(&self) {
        self.destinations.inc();
    }

    pub fn snapshot(&self) -> OutputMetricsSnapshot {
        OutputMetricsSnapshot {
            metrics_added: self.metrics_added.get(),
            metrics_filtered: self.metrics_filtered.get(),
            metrics_dropped: self.metrics_dropped.get(),
            metrics_written: self.metrics_written.get(),
            batches_written: self.batches_written.get(),
            write_errors: self.write_errors.get(),
            write_time_ns: self.write_time_ns.get(),
            destinations: self.destinations.get(),
        }
    }
}

/// Point-in-time snapshot of output counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutputMetricsSnapshot {
    pub metrics_added: u64,
    pub metrics_filtered: u64,
    pub metrics_dropped: u64,
    pub metrics_written: u64,
    pub batches_written: u64,
    pub write_errors: u64,
    pub write_time_ns: u64,
    pub destinations: u64,
}

/// Implemented by output metrics handles
pub trait OutputMetricsProvider: Send + Sync {
    fn output_id(&self) -> &str;

    fn output_type(&self) -> &str;

    fn snapshot(&self) -> OutputMetricsSnapshot;
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Counters for the flush worker pool
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    flushes_enqueued: Counter,
    flushes_skipped: Counter,
    flushes_completed: Counter,
}

impl DispatcherMetrics {
    pub const fn new() -> Self {
        Self {
            flushes_enqueued: Counter::new(),
            flushes_skipped: Counter::new(),
            flushes_completed: Counter::new(),
        }
    }

    #[inline]
    pub fn record_enqueued(&self) {
        self.flushes_enqueued.inc();
    }

    /// Record a scheduled flush skipped because the work queue was full
    #[inline]
    pub fn record_skipped(&self) {
        self.flushes_skipped.inc();
    }

    #[inline]
    pub fn record_completed(&self) {
        self.flushes_completed.inc();
    }

    pub fn snapshot(&self) -> DispatcherSnapshot {
        DispatcherSnapshot {
            flushes_enqueued: self.flushes_enqueued.get(),
            flushes_skipped: self.flushes_skipped.get(),
            flushes_completed: self.flushes_completed.get(),
        }
    }
}

/// Point-in-time snapshot of dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherSnapshot {
    pub flushes_enqueued: u64,
    pub flushes_skipped: u64,
    pub flushes_completed: u64,
}

/// Implemented by the dispatcher metrics handle
pub trait DispatcherMetricsProvider: Send + Sync {
    fn dispatcher_snapshot(&self) -> DispatcherSnapshot;
}

// ============================================================================
// Aggregators
// ============================================================================

/// Counters for one configured aggregator
#[derive(Debug, Default)]
pub struct AggregatorMetrics {
    metrics_added: Counter,
    metrics_out_of_window: Counter,
    metrics_pushed: Counter,
    pushes: Counter,
    errors: Counter,
}

impl AggregatorMetrics {
    pub const fn new() -> Self {
        Self {
            metrics_added: Counter::new(),
            metrics_out_of_window: Counter::new(),
            metrics_pushed: Counter::new(),
            pushes: Counter::new(),
            errors: Counter::new(),
        }
    }

    #[inline]
    pub fn record_added(&self) {
        self.metrics_added.inc();
    }

    /// Record a metric outside the open window (too late or too early)
    #[inline]
    pub fn record_out_of_window(&self) {
        self.metrics_out_of_window.inc();
    }

    #[inline]
    pub fn record_push(&self, emitted: u64) {
        self.pushes.inc();
        self.metrics_pushed.add(emitted);
    }

    /// Record a panic in the aggregator's add or push
    #[inline]
    pub fn record_error(&self) {
        self.errors.inc();
    }

    pub fn snapshot(&self) -> AggregatorMetricsSnapshot {
        AggregatorMetricsSnapshot {
            metrics_added: self.metrics_added.get(),
            metrics_out_of_window: self.metrics_out_of_window.get(),
            metrics_pushed: self.metrics_pushed.get(),
            pushes: self.pushes.get(),
            errors: self.errors.get(),
        }
    }
}

/// Point-in-time snapshot of aggregator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregatorMetricsSnapshot {
    pub metrics_added: u64,
    pub metrics_out_of_window: u64,
    pub metrics_pushed: u64,
    pub pushes: u64,
    pub errors: u64,
}

/// Implemented by aggregator metrics handles
pub trait AggregatorMetricsProvider: Send + Sync {
    fn aggregator_id(&self) -> &str;

    fn aggregator_type(&self) -> &str;

    fn snapshot(&self) -> AggregatorMetricsSnapshot;
}
