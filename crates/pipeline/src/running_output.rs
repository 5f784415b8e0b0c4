//! Configured output instances
//!
//! A [`RunningOutput`] binds an [`Output`] to its id, filter, flush
//! settings and destination router. Metrics that pass the filter are routed
//! to a destination, which is created and attached to the dispatcher on
//! first use.

use std::sync::Arc;

use tally_filter::Filter;
use tally_metric::Metric;
use tally_metrics::{OutputMetrics, OutputMetricsProvider, OutputMetricsSnapshot};
use tally_routing::{DestinationCache, MetricRouter, RoutingPolicy};

use crate::util::{DEFAULT_LOG_INTERVAL, RateLimitedLogger, catch_panic};
use crate::{Destination, Dispatcher, FlushSettings, Output, PipelineError, Result};

pub struct RunningOutput {
    id: Arc<str>,
    plugin: String,
    sink: Arc<dyn Output>,
    filter: Filter,
    settings: FlushSettings,
    router: MetricRouter<Destination>,
    dispatcher: Dispatcher,
    metrics: Arc<OutputMetrics>,
    errors: Arc<RateLimitedLogger>,
}

/// Output counters for the metrics reporter
#[derive(Clone)]
pub struct OutputMetricsHandle {
    id: Arc<str>,
    plugin: String,
    metrics: Arc<OutputMetrics>,
}

impl OutputMetricsProvider for OutputMetricsHandle {
    fn output_id(&self) -> &str {
        &self.id
    }

    fn output_type(&self) -> &str {
        &self.plugin
    }

    fn snapshot(&self) -> OutputMetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Everything needed to build a [`RunningOutput`] besides the sink
#[derive(Debug, Clone)]
pub struct OutputSettings {
    /// Instance id (alias or generated)
    pub id: String,
    /// Plugin name
    pub plugin: String,
    pub filter: Filter,
    pub flush: FlushSettings,
    pub policy: RoutingPolicy,
    /// Maximum number of non-well-known destinations
    pub destination_limit: Option<usize>,
}

impl RunningOutput {
    pub fn new(settings: OutputSettings, sink: Arc<dyn Output>, dispatcher: Dispatcher) -> Self {
        let cache = match settings.destination_limit {
            Some(limit) => DestinationCache::with_limit(limit),
            None => DestinationCache::new(),
        };
        let id: Arc<str> = Arc::from(settings.id);
        Self {
            errors: Arc::new(RateLimitedLogger::new(id.to_string(), DEFAULT_LOG_INTERVAL)),
            id,
            plugin: settings.plugin,
            sink,
            filter: settings.filter,
            settings: settings.flush,
            router: MetricRouter::with_cache(settings.policy, cache),
            dispatcher,
            metrics: Arc::new(OutputMetrics::new()),
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn metrics_handle(&self) -> OutputMetricsHandle {
        OutputMetricsHandle {
            id: Arc::clone(&self.id),
            plugin: self.plugin.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Connect the sink
    ///
    /// # Errors
    ///
    /// `PipelineError::Connect` with the sink's error.
    pub async fn connect(&self) -> Result<()> {
        catch_panic(self.sink.connect())
            .await
            .unwrap_or_else(|panic| Err(anyhow::anyhow!("connect panicked: {panic}")))
            .map_err(|e| PipelineError::connect(self.id.as_ref(), e))
    }

    /// Filter, route and buffer one metric; never blocks on the sink
    pub fn add(&self, metric: Metric) {
        let Some(metric) = self.filter.select(metric) else {
            self.metrics.record_filtered();
            return;
        };

        let (destination, created) = self.router.route(&metric, |key| {
            Destination::new(
                key.clone(),
                Arc::clone(&self.id),
                Arc::clone(&self.sink),
                self.settings,
                Arc::clone(&self.metrics),
                Arc::clone(&self.errors),
            )
        });

        if created {
            self.metrics.record_destination();
            tracing::debug!(
                output = %self.id,
                destination = %destination.key(),
                "destination created"
            );
            self.dispatcher.attach(Arc::clone(&destination));
        }

        destination.add(metric);
    }

    /// All destinations created so far, ordered by key
    pub fn destinations(&self) -> Vec<Arc<Destination>> {
        self.router.cache().values()
    }

    /// Metrics rerouted to the default destination because of the limit
    pub fn overflow_count(&self) -> u64 {
        self.router.overflow_count()
    }

    /// Close the sink; call after the dispatcher has drained
    ///
    /// # Errors
    ///
    /// `PipelineError::Close` with the sink's error.
    pub async fn close(&self) -> Result<()> {
        catch_panic(self.sink.close())
            .await
            .unwrap_or_else(|panic| Err(anyhow::anyhow!("close panicked: {panic}")))
            .map_err(|e| PipelineError::close(self.id.as_ref(), e))
    }
}

impl std::fmt::Debug for RunningOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningOutput")
            .field("id", &self.id)
            .field("plugin", &self.plugin)
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
#[path = "running_output_test.rs"]
mod tests;
