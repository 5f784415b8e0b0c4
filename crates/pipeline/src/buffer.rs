//! Bounded metric buffer
//!
//! Fixed-capacity FIFO of pending metrics for one destination. Adding never
//! blocks and never fails: when full, the oldest metric is evicted and
//! counted. Draining removes the oldest entries first.
//!
//! # Example
//!
//! ```
//! use tally_pipeline::MetricBuffer;
//! # use tally_metric::Metric;
//! # let m = |n: &str| Metric::new(n, chrono::Utc::now()).with_field("v", 1i64);
//!
//! let buffer = MetricBuffer::new(2);
//! buffer.add(m("a"));
//! buffer.add(m("b"));
//! buffer.add(m("c")); // evicts "a"
//!
//! let batch = buffer.drain(10);
//! assert_eq!(batch[0].name(), "b");
//! assert_eq!(buffer.dropped(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tally_metric::Metric;

/// Result of one [`MetricBuffer::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    /// Buffer length after the insert
    pub len: usize,
    /// Whether the oldest metric was evicted to make room
    pub evicted: bool,
}

/// Fixed-capacity FIFO with evict-oldest overflow
#[derive(Debug)]
pub struct MetricBuffer {
    entries: Mutex<VecDeque<Metric>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl MetricBuffer {
    /// Create a buffer holding at most `capacity` metrics (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Append a metric, evicting the oldest one if the buffer is full
    pub fn add(&self, metric: Metric) -> AddOutcome {
        let mut entries = self.entries.lock();
        let evicted = if entries.len() >= self.capacity {
            entries.pop_front();
            true
        } else {
            false
        };
        entries.push_back(metric);
        let len = entries.len();
        drop(entries);

        if evicted {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        AddOutcome { len, evicted }
    }

    /// Remove and return up to `max` of the oldest metrics, oldest first
    pub fn drain(&self, max: usize) -> Vec<Metric> {
        let mut entries = self.entries.lock();
        let n = max.min(entries.len());
        entries.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Metrics evicted since creation
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[path = "buffer_test.rs"]
mod tests;
