//! Flush dispatcher
//!
//! A fixed pool of workers pulls flush jobs from one bounded queue. Each
//! destination has its own timer task that enqueues a job every
//! `flush_interval + jitter`, or early when a full batch is buffered.
//!
//! # Design
//!
//! - Timers never block: if the queue is full the flush is skipped and
//!   counted, and the timer waits for its next tick.
//! - At most one job per destination is queued at a time.
//! - Writes for different destinations run concurrently on different
//!   workers; one destination's batches keep buffer order.
//!
//! # Shutdown
//!
//! [`Dispatcher::shutdown`] stops the timers, queues one final draining job
//! per destination, closes the queue and waits for the workers, bounded by a
//! timeout.
//!
//! ```text
//! timer(dest A) ──try_send──┐                  ┌──► worker 0 ──► A.flush()
//! timer(dest B) ──try_send──┼──► job queue ────┤
//! timer(dest C) ──try_send──┘   (bounded)      └──► worker 1 ──► C.flush()
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossfire::{MAsyncRx, MAsyncTx, TrySendError};
use parking_lot::Mutex;
use tally_metrics::{DispatcherMetrics, DispatcherMetricsProvider, DispatcherSnapshot};
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::{Destination, PipelineError, Result};

/// Worker pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub queue_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_size: 64,
        }
    }
}

struct FlushJob {
    destination: Arc<Destination>,
    drain: bool,
}

/// Handle to the flush worker pool; cheap to clone
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    /// Taken at shutdown so workers see end-of-queue
    jobs: Mutex<Option<MAsyncTx<FlushJob>>>,
    destinations: Mutex<Vec<Arc<Destination>>>,
    timers: TaskTracker,
    timer_cancel: CancellationToken,
    workers: TaskTracker,
    worker_cancel: CancellationToken,
    metrics: Arc<DispatcherMetrics>,
    shut_down: AtomicBool,
    worker_count: usize,
}

/// Dispatcher counters for the metrics reporter
#[derive(Clone)]
pub struct DispatcherMetricsHandle {
    metrics: Arc<DispatcherMetrics>,
}

impl DispatcherMetricsProvider for DispatcherMetricsHandle {
    fn dispatcher_snapshot(&self) -> DispatcherSnapshot {
        self.metrics.snapshot()
    }
}

impl Dispatcher {
    /// Start the worker pool
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(config: DispatcherConfig) -> Self {
        let worker_count = config.workers.max(1);
        let (tx, rx) = crossfire::mpmc::bounded_async::<FlushJob>(config.queue_size.max(1));

        let inner = Arc::new(Inner {
            jobs: Mutex::new(Some(tx)),
            destinations: Mutex::new(Vec::new()),
            timers: TaskTracker::new(),
            timer_cancel: CancellationToken::new(),
            workers: TaskTracker::new(),
            worker_cancel: CancellationToken::new(),
            metrics: Arc::new(DispatcherMetrics::new()),
            shut_down: AtomicBool::new(false),
            worker_count,
        });

        for worker_id in 0..worker_count {
            let rx = rx.clone();
            let cancel = inner.worker_cancel.clone();
            let metrics = Arc::clone(&inner.metrics);
            inner
                .workers
                .spawn(run_worker(worker_id, rx, cancel, metrics));
        }

        tracing::info!(
            workers = worker_count,
            queue_size = config.queue_size,
            "flush dispatcher started"
        );

        Self { inner }
    }

    pub fn metrics_handle(&self) -> DispatcherMetricsHandle {
        DispatcherMetricsHandle {
            metrics: Arc::clone(&self.inner.metrics),
        }
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.inner.worker_count
    }

    /// Number of destinations with a flush timer
    pub fn destination_count(&self) -> usize {
        self.inner.destinations.lock().len()
    }

    /// Start the flush timer of a newly created destination
    pub fn attach(&self, destination: Arc<Destination>) {
        let Some(tx) = self.inner.jobs.lock().clone() else {
            tracing::warn!(
                destination = %destination.key(),
                "destination created after dispatcher shutdown; it will not be flushed"
            );
            return;
        };
        self.inner.destinations.lock().push(Arc::clone(&destination));

        let cancel = self.inner.timer_cancel.clone();
        let metrics = Arc::clone(&self.inner.metrics);
        self.inner
            .timers
            .spawn(run_timer(destination, tx, cancel, metrics));
    }

    /// Stop timers, drain every destination through the workers, stop workers
    ///
    /// Safe to call more than once; later calls return immediately.
    ///
    /// # Errors
    ///
    /// `PipelineError::DrainTimeout` if metrics were still buffered when
    /// `timeout` elapsed; the workers are cancelled in that case.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.inner.timer_cancel.cancel();
        self.inner.timers.close();
        self.inner.timers.wait().await;

        let tx = self.inner.jobs.lock().take();
        let destinations: Vec<_> = self.inner.destinations.lock().clone();

        let drain = async {
            if let Some(tx) = tx {
                for destination in &destinations {
                    // Clear any stale mark so the final drain always runs
                    destination.clear_pending();
                    let job = FlushJob {
                        destination: Arc::clone(destination),
                        drain: true,
                    };
                    if tx.send(job).await.is_err() {
                        break;
                    }
                }
            }
            self.inner.workers.close();
            self.inner.workers.wait().await;
        };

        let result = tokio::time::timeout(timeout, drain).await;
        let remaining: usize = destinations.iter().map(|d| d.buffered()).sum();

        match result {
            Ok(()) => {
                tracing::info!(
                    destinations = destinations.len(),
                    remaining,
                    "flush dispatcher stopped"
                );
                Ok(())
            }
            Err(_) => {
                self.inner.worker_cancel.cancel();
                self.inner.workers.close();
                self.inner.workers.wait().await;
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    remaining,
                    "shutdown drain timed out"
                );
                Err(PipelineError::DrainTimeout { remaining })
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("workers", &self.inner.worker_count)
            .field("destinations", &self.destination_count())
            .finish()
    }
}

async fn run_worker(
    worker_id: usize,
    rx: MAsyncRx<FlushJob>,
    cancel: CancellationToken,
    metrics: Arc<DispatcherMetrics>,
) {
    tracing::debug!(worker_id, "flush worker starting");

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = rx.recv() => match job {
                Ok(job) => job,
                Err(_) => break,
            },
        };

        // Cleared before flushing so new triggers can queue the next flush
        job.destination.clear_pending();
        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            written = job.destination.flush(job.drain) => written,
        };
        metrics.record_completed();

        tracing::trace!(
            worker_id,
            destination = %job.destination.key(),
            written,
            drain = job.drain,
            "flush completed"
        );
    }

    tracing::debug!(worker_id, "flush worker stopping");
}

async fn run_timer(
    destination: Arc<Destination>,
    tx: MAsyncTx<FlushJob>,
    cancel: CancellationToken,
    metrics: Arc<DispatcherMetrics>,
) {
    let mut deadline = destination.next_flush_deadline();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep_until(deadline) => {
                deadline = destination.next_flush_deadline();
            }
            _ = destination.batch_ready() => {}
        }

        if !destination.try_mark_pending() {
            continue;
        }

        let job = FlushJob {
            destination: Arc::clone(&destination),
            drain: false,
        };
        match tx.try_send(job) {
            Ok(()) => metrics.record_enqueued(),
            Err(TrySendError::Full(_)) => {
                destination.clear_pending();
                metrics.record_skipped();
            }
            Err(TrySendError::Disconnected(_)) => {
                destination.clear_pending();
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod tests;
