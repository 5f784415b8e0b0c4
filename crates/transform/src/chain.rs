//! Processor Chain - Ordered per-metric transformation
//!
//! # Design
//!
//! - **Total order**: processors sort by `(order, ordinal)`; the ordinal is
//!   the block's position in the configuration file, so ties are stable
//! - **Filtered selection**: a processor only sees metrics its filter
//!   matches; everything else passes it untouched
//! - **Per-metric failure**: an error or panic drops that metric only,
//!   reported through a rate-limited logger
//! - **Zero-cost when empty**: an empty chain returns its input

use std::sync::Arc;

use tally_filter::Filter;
use tally_metric::Metric;
use tally_pipeline::util::{DEFAULT_LOG_INTERVAL, RateLimitedLogger, catch_panic};

use crate::{Processor, TransformError, TransformResult};

#[cfg(test)]
#[path = "chain_test.rs"]
mod tests;

/// Resolved configuration of one processor block
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    /// Instance id (alias or generated)
    pub id: String,
    /// Plugin name
    pub plugin: String,
    pub order: i64,
    /// Position among all processor blocks
    pub ordinal: usize,
    pub filter: Filter,
}

/// A processor bound to its configuration
pub struct RunningProcessor {
    settings: ProcessorSettings,
    processor: Box<dyn Processor>,
    errors: Arc<RateLimitedLogger>,
}

impl RunningProcessor {
    pub fn new(settings: ProcessorSettings, processor: Box<dyn Processor>) -> Self {
        Self {
            errors: Arc::new(RateLimitedLogger::new(
                settings.id.clone(),
                DEFAULT_LOG_INTERVAL,
            )),
            settings,
            processor,
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.settings.id
    }

    #[inline]
    pub fn plugin(&self) -> &str {
        &self.settings.plugin
    }

    #[inline]
    pub fn order(&self) -> i64 {
        self.settings.order
    }

    #[inline]
    fn sort_key(&self) -> (i64, usize) {
        (self.settings.order, self.settings.ordinal)
    }

    /// Run the processor if the filter selects the metric
    ///
    /// A panic in the processor is returned as `TransformError::Panicked`.
    pub async fn apply(&self, metric: Metric) -> TransformResult<Vec<Metric>> {
        if !self.settings.filter.matches(&metric) {
            return Ok(vec![metric]);
        }
        match self.settings.filter.select(metric) {
            Some(selected) => catch_panic(self.processor.process(selected))
                .await
                .unwrap_or_else(|panic| Err(TransformError::panicked(panic))),
            None => Ok(Vec::new()),
        }
    }

    /// Total errors reported by this processor
    pub fn error_count(&self) -> u64 {
        self.errors.total_error_count()
    }
}

impl std::fmt::Debug for RunningProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningProcessor")
            .field("id", &self.settings.id)
            .field("plugin", &self.settings.plugin)
            .field("order", &self.settings.order)
            .field("ordinal", &self.settings.ordinal)
            .finish()
    }
}

/// Processors applied in sequence
pub struct ProcessorChain {
    processors: Vec<RunningProcessor>,
}

impl ProcessorChain {
    /// Create a chain; processors are sorted by `(order, ordinal)`
    pub fn new(mut processors: Vec<RunningProcessor>) -> Self {
        processors.sort_by_key(RunningProcessor::sort_key);
        Self { processors }
    }

    /// Create an empty chain (no-op)
    pub fn empty() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Instance ids in execution order
    pub fn ids(&self) -> Vec<&str> {
        self.processors.iter().map(RunningProcessor::id).collect()
    }

    pub fn get(&self, id: &str) -> Option<&RunningProcessor> {
        self.processors.iter().find(|p| p.id() == id)
    }

    /// Run one metric through every processor
    ///
    /// A processor error drops the metric being processed and is logged;
    /// the rest of the chain never sees it.
    pub async fn apply(&self, metric: Metric) -> Vec<Metric> {
        if self.processors.is_empty() {
            return vec![metric];
        }

        let mut current = vec![metric];
        for processor in &self.processors {
            let mut next = Vec::with_capacity(current.len());
            for metric in current {
                match processor.apply(metric).await {
                    Ok(out) => next.extend(out),
                    Err(e) => {
                        processor.errors.error("processor failed, metric dropped", &e);
                    }
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    /// Run a batch through the chain, keeping input order
    pub async fn apply_all(&self, metrics: Vec<Metric>) -> Vec<Metric> {
        let mut out = Vec::with_capacity(metrics.len());
        for metric in metrics {
            out.extend(self.apply(metric).await);
        }
        out
    }

    /// Close every processor; failures are logged
    pub async fn close(&self) {
        for processor in &self.processors {
            if let Err(e) = processor.processor.close().await {
                tracing::warn!(processor = %processor.id(), error = %e, "processor close failed");
            }
        }
    }
}

impl Default for ProcessorChain {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorChain")
            .field("processors", &self.ids())
            .finish()
    }
}
