//! Destinations
//!
//! A destination is one buffer plus its flush parameters, created lazily by
//! a [`RunningOutput`](crate::RunningOutput) the first time a metric routes
//! to its key. It lives until shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tally_metric::Metric;
use tally_metrics::OutputMetrics;
use tally_routing::DestinationKey;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::util::{RateLimitedLogger, catch_panic, jittered};
use crate::{MetricBuffer, Output};

/// Batch and flush parameters shared by all destinations of one output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushSettings {
    pub batch_size: usize,
    pub buffer_limit: usize,
    pub flush_interval: Duration,
    pub flush_jitter: Duration,
}

pub struct Destination {
    key: DestinationKey,
    output_id: Arc<str>,
    sink: Arc<dyn Output>,
    buffer: MetricBuffer,
    settings: FlushSettings,
    /// Signalled when the buffer holds at least one full batch
    batch_ready: Notify,
    /// A flush job for this destination is queued and not yet started
    flush_pending: AtomicBool,
    provisioned: AtomicBool,
    metrics: Arc<OutputMetrics>,
    errors: Arc<RateLimitedLogger>,
}

impl Destination {
    pub fn new(
        key: DestinationKey,
        output_id: Arc<str>,
        sink: Arc<dyn Output>,
        settings: FlushSettings,
        metrics: Arc<OutputMetrics>,
        errors: Arc<RateLimitedLogger>,
    ) -> Self {
        Self {
            key,
            output_id,
            sink,
            buffer: MetricBuffer::new(settings.buffer_limit),
            settings,
            batch_ready: Notify::new(),
            flush_pending: AtomicBool::new(false),
            provisioned: AtomicBool::new(false),
            metrics,
            errors,
        }
    }

    #[inline]
    pub fn key(&self) -> &DestinationKey {
        &self.key
    }

    #[inline]
    pub fn output_id(&self) -> &str {
        &self.output_id
    }

    #[inline]
    pub fn settings(&self) -> &FlushSettings {
        &self.settings
    }

    /// Metrics waiting to be flushed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Metrics evicted from this destination's buffer
    pub fn dropped(&self) -> u64 {
        self.buffer.dropped()
    }

    /// Buffer a metric; never blocks
    pub fn add(&self, metric: Metric) {
        let outcome = self.buffer.add(metric);
        self.metrics.record_added();
        if outcome.evicted {
            self.metrics.record_dropped(1);
        }
        if outcome.len >= self.settings.batch_size {
            self.batch_ready.notify_one();
        }
    }

    /// Deadline of the next timed flush, counted from now
    pub(crate) fn next_flush_deadline(&self) -> Instant {
        Instant::now() + jittered(self.settings.flush_interval, self.settings.flush_jitter)
    }

    pub(crate) async fn batch_ready(&self) {
        self.batch_ready.notified().await;
    }

    /// Mark a flush as queued; false if one already is
    pub(crate) fn try_mark_pending(&self) -> bool {
        !self.flush_pending.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn clear_pending(&self) {
        self.flush_pending.store(false, Ordering::Release);
    }

    /// Write buffered metrics in batches
    ///
    /// A timed flush writes the batches present when it starts; with
    /// `drain_all` it keeps going until the buffer is empty. Either stops at
    /// the first failed write. A failed batch is not put back. Returns the
    /// number of metrics written.
    pub async fn flush(&self, drain_all: bool) -> usize {
        if !self.ensure_provisioned().await {
            return 0;
        }

        let batch_size = self.settings.batch_size.max(1);
        let rounds = if drain_all {
            usize::MAX
        } else {
            self.buffer.len() / batch_size + 1
        };

        let mut written = 0;
        for _ in 0..rounds {
            let batch = self.buffer.drain(batch_size);
            if batch.is_empty() {
                break;
            }
            match self.write_batch(&batch).await {
                true => written += batch.len(),
                false => break,
            }
        }
        written
    }

    async fn ensure_provisioned(&self) -> bool {
        if self.provisioned.load(Ordering::Acquire) {
            return true;
        }
        let provisioned = catch_panic(self.sink.provision(&self.key))
            .await
            .unwrap_or_else(|panic| Err(anyhow::anyhow!("provision panicked: {panic}")));
        match provisioned {
            Ok(()) => {
                self.provisioned.store(true, Ordering::Release);
                tracing::debug!(
                    output = %self.output_id,
                    destination = %self.key,
                    "destination provisioned"
                );
                true
            }
            Err(e) => {
                self.metrics.record_error();
                self.errors.error("destination provisioning failed", &e);
                false
            }
        }
    }

    async fn write_batch(&self, batch: &[Metric]) -> bool {
        let start = Instant::now();
        let written = catch_panic(self.sink.write(&self.key, batch))
            .await
            .unwrap_or_else(|panic| Err(anyhow::anyhow!("write panicked: {panic}")));
        match written {
            Ok(()) => {
                self.metrics.record_written(batch.len() as u64, start.elapsed());
                tracing::trace!(
                    output = %self.output_id,
                    destination = %self.key,
                    count = batch.len(),
                    "batch written"
                );
                true
            }
            Err(e) => {
                self.metrics.record_error();
                self.errors.error("write failed", &e);
                false
            }
        }
    }
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Destination")
            .field("key", &self.key)
            .field("output", &self.output_id)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
