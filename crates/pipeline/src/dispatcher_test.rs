//! Tests for the flush dispatcher
//!
//! All tests run on paused time so flush intervals are exact.

use super::*;
use crate::{FlushSettings, Output};
use async_trait::async_trait;
use chrono::DateTime;
use std::sync::atomic::AtomicUsize;
use tally_metric::{FieldValue, Metric};
use tally_metrics::OutputMetrics;
use tally_routing::DestinationKey;
use tokio::sync::Semaphore;

use crate::util::RateLimitedLogger;

// ============================================================================
// Test sink
// ============================================================================

#[derive(Default)]
struct CaptureOutput {
    batches: Mutex<Vec<Vec<Metric>>>,
    fail_writes: AtomicUsize,
    fail_provisions: AtomicUsize,
    panic_writes: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl CaptureOutput {
    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    fn written(&self) -> Vec<i64> {
        self.batches.lock().iter().flatten().map(seq).collect()
    }

    fn batch_seqs(&self) -> Vec<Vec<i64>> {
        self.batches
            .lock()
            .iter()
            .map(|b| b.iter().map(seq).collect())
            .collect()
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl Output for CaptureOutput {
    async fn provision(&self, _destination: &DestinationKey) -> anyhow::Result<()> {
        if take_one(&self.fail_provisions) {
            anyhow::bail!("not ready");
        }
        Ok(())
    }

    async fn write(&self, _destination: &DestinationKey, metrics: &[Metric]) -> anyhow::Result<()> {
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        if take_one(&self.panic_writes) {
            panic!("sink exploded");
        }
        if take_one(&self.fail_writes) {
            anyhow::bail!("sink down");
        }
        self.batches.lock().push(metrics.to_vec());
        Ok(())
    }
}

fn seq(metric: &Metric) -> i64 {
    match metric.field("seq") {
        Some(FieldValue::Int(v)) => *v,
        other => panic!("unexpected field {other:?}"),
    }
}

fn metric(i: i64) -> Metric {
    Metric::new("m", DateTime::from_timestamp_nanos(0)).with_field("seq", i)
}

fn destination(
    name: &str,
    sink: Arc<CaptureOutput>,
    batch_size: usize,
    flush_interval: Duration,
) -> (Arc<Destination>, Arc<OutputMetrics>) {
    let metrics = Arc::new(OutputMetrics::new());
    let destination = Destination::new(
        DestinationKey::new(name, "", None),
        Arc::from("test"),
        sink,
        FlushSettings {
            batch_size,
            buffer_limit: batch_size * 10,
            flush_interval,
            flush_jitter: Duration::ZERO,
        },
        Arc::clone(&metrics),
        Arc::new(RateLimitedLogger::new("test", Duration::from_secs(10))),
    );
    (Arc::new(destination), metrics)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

const HOUR: Duration = Duration::from_secs(3600);

// ============================================================================
// Timed and batch-full flushes
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_timed_flush_after_interval() {
    let dispatcher = Dispatcher::start(DispatcherConfig::default());
    let sink = Arc::new(CaptureOutput::default());
    let (dest, _) = destination("a", sink.clone(), 100, Duration::from_secs(5));
    dispatcher.attach(dest.clone());

    for i in 0..3 {
        dest.add(metric(i));
    }

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(sink.written().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.written(), vec![0, 1, 2]);
    assert_eq!(dest.buffered(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_full_batch_flushes_early() {
    let dispatcher = Dispatcher::start(DispatcherConfig::default());
    let sink = Arc::new(CaptureOutput::default());
    let (dest, _) = destination("a", sink.clone(), 2, HOUR);
    dispatcher.attach(dest.clone());

    dest.add(metric(0));
    settle().await;
    assert!(sink.written().is_empty());

    dest.add(metric(1));
    settle().await;
    assert_eq!(sink.written(), vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_batches_keep_insertion_order() {
    let dispatcher = Dispatcher::start(DispatcherConfig::default());
    let sink = Arc::new(CaptureOutput::default());
    let (dest, _) = destination("a", sink.clone(), 2, Duration::from_secs(1));
    dispatcher.attach(dest.clone());

    // Added before the timer can run, so one flush drains both batches
    for i in 0..4 {
        dest.add(metric(i));
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(sink.batch_seqs(), vec![vec![0, 1], vec![2, 3]]);
}

#[tokio::test(start_paused = true)]
async fn test_destinations_flush_independently() {
    let dispatcher = Dispatcher::start(DispatcherConfig::default());
    let fast_sink = Arc::new(CaptureOutput::default());
    let slow_sink = Arc::new(CaptureOutput::default());
    let (fast, _) = destination("fast", fast_sink.clone(), 100, Duration::from_secs(1));
    let (slow, _) = destination("slow", slow_sink.clone(), 100, Duration::from_secs(10));
    dispatcher.attach(fast.clone());
    dispatcher.attach(slow.clone());

    fast.add(metric(1));
    slow.add(metric(2));
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(fast_sink.written(), vec![1]);
    assert!(slow_sink.written().is_empty());
    assert_eq!(dispatcher.destination_count(), 2);
}

// ============================================================================
// Failures and overload
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_batch_is_not_reinserted() {
    let dispatcher = Dispatcher::start(DispatcherConfig::default());
    let sink = Arc::new(CaptureOutput::default());
    sink.fail_writes.store(1, Ordering::SeqCst);
    let (dest, metrics) = destination("a", sink.clone(), 2, HOUR);
    dispatcher.attach(dest.clone());

    dest.add(metric(0));
    dest.add(metric(1));
    settle().await;

    assert!(sink.written().is_empty());
    assert_eq!(dest.buffered(), 0);
    assert_eq!(metrics.snapshot().write_errors, 1);

    // Later metrics are still accepted and written
    dest.add(metric(2));
    dest.add(metric(3));
    settle().await;
    assert_eq!(sink.written(), vec![2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_sink_does_not_stop_workers() {
    let dispatcher = Dispatcher::start(DispatcherConfig::default());
    let bad_sink = Arc::new(CaptureOutput::default());
    bad_sink.panic_writes.store(usize::MAX, Ordering::SeqCst);
    let good_sink = Arc::new(CaptureOutput::default());
    let (bad, bad_metrics) = destination("bad", bad_sink.clone(), 1, HOUR);
    let (good, _) = destination("good", good_sink.clone(), 1, HOUR);
    dispatcher.attach(bad.clone());
    dispatcher.attach(good.clone());

    // More panics than there are workers
    for i in 0..3 {
        bad.add(metric(i));
        settle().await;
    }
    assert!(bad_sink.written().is_empty());
    assert_eq!(bad.buffered(), 0);
    assert_eq!(bad_metrics.snapshot().write_errors, 3);

    good.add(metric(42));
    settle().await;
    assert_eq!(good_sink.written(), vec![42]);

    dispatcher.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_provision_failure_keeps_metrics_buffered() {
    let dispatcher = Dispatcher::start(DispatcherConfig::default());
    let sink = Arc::new(CaptureOutput::default());
    sink.fail_provisions.store(1, Ordering::SeqCst);
    let (dest, metrics) = destination("a", sink.clone(), 100, Duration::from_secs(1));
    dispatcher.attach(dest.clone());

    dest.add(metric(0));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(sink.written().is_empty());
    assert_eq!(dest.buffered(), 1);
    assert_eq!(metrics.snapshot().write_errors, 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(sink.written(), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn test_full_queue_skips_flush() {
    let gate = Arc::new(Semaphore::new(0));
    let dispatcher = Dispatcher::start(DispatcherConfig {
        workers: 1,
        queue_size: 1,
    });
    let sink = Arc::new(CaptureOutput::gated(gate.clone()));

    let dests: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            let (dest, _) = destination(name, sink.clone(), 1, HOUR);
            dispatcher.attach(dest.clone());
            dest
        })
        .collect();

    // The worker blocks on "a", "b" fills the queue, "c" is skipped
    for (i, dest) in dests.iter().enumerate() {
        dest.add(metric(i as i64));
        settle().await;
    }

    let snapshot = dispatcher.metrics_handle().dispatcher_snapshot();
    assert_eq!(snapshot.flushes_enqueued, 2);
    assert_eq!(snapshot.flushes_skipped, 1);
    assert_eq!(dests[2].buffered(), 1);

    // Shutdown drains what the skipped flush left behind
    gate.add_permits(100);
    dispatcher.shutdown(Duration::from_secs(5)).await.unwrap();
    let mut written = sink.written();
    written.sort();
    assert_eq!(written, vec![0, 1, 2]);
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_all_destinations() {
    let dispatcher = Dispatcher::start(DispatcherConfig::default());
    let sink = Arc::new(CaptureOutput::default());
    let (a, _) = destination("a", sink.clone(), 2, HOUR);
    let (b, _) = destination("b", sink.clone(), 100, HOUR);
    dispatcher.attach(a.clone());
    dispatcher.attach(b.clone());

    a.add(metric(0));
    for i in 10..15 {
        b.add(metric(i));
    }

    dispatcher.shutdown(Duration::from_secs(5)).await.unwrap();

    let mut written = sink.written();
    written.sort();
    assert_eq!(written, vec![0, 10, 11, 12, 13, 14]);
    assert_eq!(a.buffered() + b.buffered(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_double_shutdown_is_noop() {
    let dispatcher = Dispatcher::start(DispatcherConfig::default());
    dispatcher.shutdown(Duration::from_secs(1)).await.unwrap();
    dispatcher.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_timeout_reports_remaining() {
    let gate = Arc::new(Semaphore::new(0));
    let dispatcher = Dispatcher::start(DispatcherConfig {
        workers: 1,
        queue_size: 4,
    });
    let sink = Arc::new(CaptureOutput::gated(gate));
    let (dest, _) = destination("a", sink.clone(), 1, HOUR);
    dispatcher.attach(dest.clone());

    // First metric is drained by a worker that never finishes its write
    for i in 0..3 {
        dest.add(metric(i));
    }
    settle().await;

    let result = dispatcher.shutdown(Duration::from_secs(1)).await;
    assert!(matches!(
        result,
        Err(PipelineError::DrainTimeout { remaining: 2 })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_attach_after_shutdown_is_ignored() {
    let dispatcher = Dispatcher::start(DispatcherConfig::default());
    dispatcher.shutdown(Duration::from_secs(1)).await.unwrap();

    let sink = Arc::new(CaptureOutput::default());
    let (dest, _) = destination("late", sink, 1, HOUR);
    dispatcher.attach(dest);
    assert_eq!(dispatcher.destination_count(), 0);
}
