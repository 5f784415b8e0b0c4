//! Collected metrics snapshot and rate calculations
//!
//! A [`CollectedMetrics`] holds every component snapshot taken at one point
//! in time. Two collections give per-second rates.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::{
    AggregatorMetricsSnapshot, DispatcherSnapshot, InputMetricsSnapshot, OutputMetricsSnapshot,
};

/// A component snapshot with its identity
#[derive(Debug, Clone, Serialize)]
pub struct Named<S> {
    /// Instance id (alias or generated)
    pub id: String,
    /// Plugin name
    pub kind: String,
    pub snapshot: S,
}

impl<S> Named<S> {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, snapshot: S) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            snapshot,
        }
    }
}

/// Complete metrics collection at a point in time
#[derive(Debug, Clone, Default)]
pub struct CollectedMetrics {
    /// When this collection was taken
    pub timestamp: Option<Instant>,

    /// Flush dispatcher counters
    pub dispatcher: Option<DispatcherSnapshot>,

    pub inputs: Vec<Named<InputMetricsSnapshot>>,

    pub outputs: Vec<Named<OutputMetricsSnapshot>>,

    pub aggregators: Vec<Named<AggregatorMetricsSnapshot>>,
}

impl CollectedMetrics {
    /// Create a new empty collection stamped now
    pub fn new() -> Self {
        Self {
            timestamp: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Sum of metrics gathered by all inputs
    pub fn total_gathered(&self) -> u64 {
        self.inputs.iter().map(|i| i.snapshot.metrics_gathered).sum()
    }

    /// Sum of metrics written by all outputs
    pub fn total_written(&self) -> u64 {
        self.outputs.iter().map(|o| o.snapshot.metrics_written).sum()
    }

    /// Sum of metrics dropped anywhere in the pipeline
    pub fn total_dropped(&self) -> u64 {
        let inputs: u64 = self.inputs.iter().map(|i| i.snapshot.metrics_dropped).sum();
        let outputs: u64 = self.outputs.iter().map(|o| o.snapshot.metrics_dropped).sum();
        inputs + outputs
    }

    /// Calculate rates by comparing with a previous collection
    ///
    /// Returns None if timestamps are missing or equal.
    pub fn rates(&self, previous: &CollectedMetrics) -> Option<MetricsRates> {
        let current_ts = self.timestamp?;
        let previous_ts = previous.timestamp?;

        let elapsed = current_ts.duration_since(previous_ts);
        if elapsed.is_zero() {
            return None;
        }
        let elapsed_secs = elapsed.as_secs_f64();

        let inputs = self
            .inputs
            .iter()
            .filter_map(|current| {
                let prev = previous.inputs.iter().find(|i| i.id == current.id)?;
                Some(InputRates {
                    id: current.id.clone(),
                    kind: current.kind.clone(),
                    metrics_per_sec: rate(
                        current.snapshot.metrics_gathered,
                        prev.snapshot.metrics_gathered,
                        elapsed_secs,
                    ),
                    errors: current
                        .snapshot
                        .gather_errors
                        .saturating_sub(prev.snapshot.gather_errors),
                    dropped: current
                        .snapshot
                        .metrics_dropped
                        .saturating_sub(prev.snapshot.metrics_dropped),
                })
            })
            .collect();

        let outputs = self
            .outputs
            .iter()
            .filter_map(|current| {
                let prev = previous.outputs.iter().find(|o| o.id == current.id)?;
                let batches = current
                    .snapshot
                    .batches_written
                    .saturating_sub(prev.snapshot.batches_written);
                let time = current
                    .snapshot
                    .write_time_ns
                    .saturating_sub(prev.snapshot.write_time_ns);

                Some(OutputRates {
                    id: current.id.clone(),
                    kind: current.kind.clone(),
                    metrics_per_sec: rate(
                        current.snapshot.metrics_written,
                        prev.snapshot.metrics_written,
                        elapsed_secs,
                    ),
                    avg_write_time: if batches > 0 {
                        Duration::from_nanos(time / batches)
                    } else {
                        Duration::ZERO
                    },
                    errors: current
                        .snapshot
                        .write_errors
                        .saturating_sub(prev.snapshot.write_errors),
                    dropped: current
                        .snapshot
                        .metrics_dropped
                        .saturating_sub(prev.snapshot.metrics_dropped),
                })
            })
            .collect();

        Some(MetricsRates {
            elapsed,
            inputs,
            outputs,
        })
    }
}

/// Calculate rate per second
#[inline]
fn rate(current: u64, previous: u64, elapsed_secs: f64) -> f64 {
    let delta = current.saturating_sub(previous);
    delta as f64 / elapsed_secs
}

/// Calculated rates between two collections
#[derive(Debug, Clone)]
pub struct MetricsRates {
    pub elapsed: Duration,
    pub inputs: Vec<InputRates>,
    pub outputs: Vec<OutputRates>,
}

/// Input rates
#[derive(Debug, Clone)]
pub struct InputRates {
    pub id: String,
    pub kind: String,
    /// Metrics gathered per second
    pub metrics_per_sec: f64,
    /// Gather errors in this period
    pub errors: u64,
    /// Metrics dropped in this period
    pub dropped: u64,
}

/// Output rates
#[derive(Debug, Clone)]
pub struct OutputRates {
    pub id: String,
    pub kind: String,
    /// Metrics written per second
    pub metrics_per_sec: f64,
    /// Average time per successful write
    pub avg_write_time: Duration,
    /// Write errors in this period
    pub errors: u64,
    /// Metrics evicted in this period
    pub dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collected_metrics_new() {
        let metrics = CollectedMetrics::new();
        assert!(metrics.timestamp.is_some());
        assert!(metrics.dispatcher.is_none());
        assert!(metrics.inputs.is_empty());
        assert!(metrics.outputs.is_empty());
    }

    #[test]
    fn test_rate_calculation() {
        assert_eq!(rate(1000, 0, 1.0), 1000.0);
        assert_eq!(rate(1000, 500, 2.0), 250.0);
        assert_eq!(rate(100, 100, 1.0), 0.0);
        // Saturating sub handles counter resets
        assert_eq!(rate(50, 100, 1.0), 0.0);
    }

    #[test]
    fn test_totals() {
        let metrics = CollectedMetrics {
            inputs: vec![
                Named::new(
                    "cpu",
                    "cpu",
                    InputMetricsSnapshot {
                        metrics_gathered: 10,
                        metrics_dropped: 1,
                        ..Default::default()
                    },
                ),
                Named::new(
                    "mem",
                    "mem",
                    InputMetricsSnapshot {
                        metrics_gathered: 5,
                        ..Default::default()
                    },
                ),
            ],
            outputs: vec![Named::new(
                "stdout",
                "stdout",
                OutputMetricsSnapshot {
                    metrics_written: 12,
                    metrics_dropped: 2,
                    ..Default::default()
                },
            )],
            ..Default::default()
        };

        assert_eq!(metrics.total_gathered(), 15);
        assert_eq!(metrics.total_written(), 12);
        assert_eq!(metrics.total_dropped(), 3);
    }

    #[test]
    fn test_output_rates() {
        let start = Instant::now();
        let prev = CollectedMetrics {
            timestamp: Some(start),
            outputs: vec![Named::new("file", "file", OutputMetricsSnapshot::default())],
            ..Default::default()
        };

        let current = CollectedMetrics {
            timestamp: Some(start + Duration::from_secs(10)),
            outputs: vec![Named::new(
                "file",
                "file",
                OutputMetricsSnapshot {
                    metrics_written: 10_000,
                    batches_written: 10,
                    write_time_ns: 10_000_000,
                    write_errors: 2,
                    ..Default::default()
                },
            )],
            ..Default::default()
        };

        let rates = current.rates(&prev).unwrap();
        assert_eq!(rates.outputs.len(), 1);
        let output = &rates.outputs[0];
        assert_eq!(output.metrics_per_sec, 1_000.0);
        assert_eq!(output.avg_write_time, Duration::from_millis(1));
        assert_eq!(output.errors, 2);
    }

    #[test]
    fn test_rates_skip_new_components() {
        let start = Instant::now();
        let prev = CollectedMetrics {
            timestamp: Some(start),
            ..Default::default()
        };
        let current = CollectedMetrics {
            timestamp: Some(start + Duration::from_secs(1)),
            inputs: vec![Named::new("cpu", "cpu", InputMetricsSnapshot::default())],
            ..Default::default()
        };

        let rates = current.rates(&prev).unwrap();
        assert!(rates.inputs.is_empty());
    }

    #[test]
    fn test_rates_need_elapsed_time() {
        let now = Instant::now();
        let a = CollectedMetrics {
            timestamp: Some(now),
            ..Default::default()
        };
        assert!(a.rates(&a.clone()).is_none());
        assert!(a.rates(&CollectedMetrics::default()).is_none());
    }
}
