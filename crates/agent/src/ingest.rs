//! Ingest - Single consumer between collection and the outputs
//!
//! # Design
//!
//! ```text
//! inputs ──ingest──► processors ──► aggregators ──(unless dropped)──► outputs
//!                                       │
//! aggregators ──aggregated──► processors (second copy) ───────────► outputs
//! ```
//!
//! One task reads both channels, so metrics of one input reach every
//! output in the order the input emitted them. The task ends when both
//! channels are disconnected (every input closed, every aggregator
//! stopped). Cancellation is the fallback for senders that never let go;
//! whatever is already queued is still processed.

use std::sync::Arc;

use crossfire::MAsyncRx;
use tally_metric::Metric;
use tally_pipeline::RunningOutput;
use tally_transform::{ProcessorChain, RunningAggregator};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Everything downstream of the ingest channel
pub(crate) struct Pipeline {
    /// Processors for metrics coming from inputs
    pub(crate) processors: ProcessorChain,
    /// Independent processor instances for aggregator output
    pub(crate) aggregate_processors: ProcessorChain,
    pub(crate) aggregators: Vec<Arc<RunningAggregator>>,
    pub(crate) outputs: Vec<Arc<RunningOutput>>,
}

impl Pipeline {
    /// Input path: processors, aggregators, then outputs unless an
    /// aggregator claims the original
    pub(crate) async fn ingest(&self, metric: Metric) {
        for metric in self.processors.apply(metric).await {
            let mut dropped = false;
            for aggregator in &self.aggregators {
                dropped |= aggregator.add(&metric);
            }
            if !dropped {
                self.fan_out(metric);
            }
        }
    }

    /// Aggregator path: second processor copy, then outputs
    pub(crate) async fn ingest_aggregated(&self, metric: Metric) {
        for metric in self.aggregate_processors.apply(metric).await {
            self.fan_out(metric);
        }
    }

    /// Final window of every aggregator, through the aggregator path
    pub(crate) async fn push_aggregators(&self) {
        for aggregator in &self.aggregators {
            for metric in aggregator.push() {
                self.ingest_aggregated(metric).await;
            }
        }
    }

    fn fan_out(&self, metric: Metric) {
        let Some((last, rest)) = self.outputs.split_last() else {
            return;
        };
        for output in rest {
            output.add(metric.clone());
        }
        last.add(metric);
    }

    pub(crate) async fn close(&self) {
        self.processors.close().await;
        self.aggregate_processors.close().await;
    }
}

/// Consume both channels until they disconnect or `cancel` fires
pub(crate) async fn run(
    pipeline: Arc<Pipeline>,
    metrics: MAsyncRx<Metric>,
    aggregated: MAsyncRx<Metric>,
    cancel: CancellationToken,
) {
    let mut metrics_open = true;
    let mut aggregated_open = true;

    while metrics_open || aggregated_open {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = metrics.recv(), if metrics_open => match received {
                Ok(metric) => pipeline.ingest(metric).await,
                Err(_) => metrics_open = false,
            },
            received = aggregated.recv(), if aggregated_open => match received {
                Ok(metric) => pipeline.ingest_aggregated(metric).await,
                Err(_) => aggregated_open = false,
            },
        }
    }

    let mut drained = 0usize;
    while let Ok(metric) = metrics.try_recv() {
        pipeline.ingest(metric).await;
        drained += 1;
    }
    while let Ok(metric) = aggregated.try_recv() {
        pipeline.ingest_aggregated(metric).await;
        drained += 1;
    }
    debug!(drained, "ingest stopped");
}
