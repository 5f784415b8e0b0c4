//! Accumulators
//!
//! The [`Accumulator`] is what input plugins see. [`MetricAccumulator`]
//! completes each metric (name rewrites, tags, origin), filters it,
//! truncates its timestamp and hands it to the ingest queue without
//! blocking.
//!
//! Every method takes `&self`; one accumulator may be used from many tasks
//! at once.
//!
//! [`MetricAccumulator::close`] releases the ingest sender. Once every
//! input's accumulator is closed the ingest task sees end-of-stream; later
//! metrics are counted as dropped.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossfire::MAsyncTx;
use parking_lot::RwLock;
use tally_filter::Filter;
use tally_metric::{FieldValue, Metric, MetricType, Origin};
use tally_metrics::InputMetrics;
use tally_pipeline::util::{DEFAULT_LOG_INTERVAL, RateLimitedLogger};

#[cfg(test)]
#[path = "accumulator_test.rs"]
mod tests;

/// Field list, in order
pub type Fields = Vec<(String, FieldValue)>;

/// Tag set
pub type Tags = BTreeMap<String, String>;

/// Sink for collected metrics and collection errors
pub trait Accumulator: Send + Sync {
    /// Add a complete metric
    fn add_metric(&self, metric: Metric);

    /// Report a collection error
    fn add_error(&self, error: anyhow::Error);

    /// Add an untyped metric; `None` timestamp means now
    fn add_fields(
        &self,
        name: &str,
        fields: Fields,
        tags: Tags,
        timestamp: Option<DateTime<Utc>>,
    ) {
        self.add_typed(name, fields, tags, timestamp, MetricType::Untyped);
    }

    fn add_gauge(&self, name: &str, fields: Fields, tags: Tags, timestamp: Option<DateTime<Utc>>) {
        self.add_typed(name, fields, tags, timestamp, MetricType::Gauge);
    }

    fn add_counter(
        &self,
        name: &str,
        fields: Fields,
        tags: Tags,
        timestamp: Option<DateTime<Utc>>,
    ) {
        self.add_typed(name, fields, tags, timestamp, MetricType::Counter);
    }

    fn add_typed(
        &self,
        name: &str,
        fields: Fields,
        tags: Tags,
        timestamp: Option<DateTime<Utc>>,
        metric_type: MetricType,
    ) {
        let metric = Metric::from_parts(name, tags, fields, timestamp.unwrap_or_else(Utc::now))
            .with_type(metric_type);
        self.add_metric(metric);
    }
}

/// Per-input rewrites applied to every metric
#[derive(Debug, Clone, Default)]
pub struct AccumulatorSettings {
    /// Plugin and instance stamped on every metric
    pub origin: Origin,
    pub name_override: Option<String>,
    pub name_prefix: Option<String>,
    pub name_suffix: Option<String>,
    /// Input tags; never replace tags the metric already has
    pub tags: Tags,
    /// Agent-wide tags; applied after input tags, never replacing
    pub global_tags: Arc<Tags>,
    pub filter: Filter,
    /// Timestamp truncation; `None` keeps full resolution
    pub precision: Option<Duration>,
}

/// Accumulator feeding the ingest queue of one input
pub struct MetricAccumulator {
    settings: AccumulatorSettings,
    /// `None` once closed
    tx: RwLock<Option<MAsyncTx<Metric>>>,
    metrics: Arc<InputMetrics>,
    errors: RateLimitedLogger,
}

impl MetricAccumulator {
    pub fn new(settings: AccumulatorSettings, tx: MAsyncTx<Metric>, metrics: Arc<InputMetrics>) -> Self {
        let errors = RateLimitedLogger::new(settings.origin.instance.clone(), DEFAULT_LOG_INTERVAL);
        Self {
            settings,
            tx: RwLock::new(Some(tx)),
            metrics,
            errors,
        }
    }

    /// Drop the ingest sender; idempotent
    pub fn close(&self) {
        self.tx.write().take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.read().is_none()
    }

    /// Apply rewrites and the filter; `None` when filtered out
    fn complete(&self, mut metric: Metric) -> Option<Metric> {
        let s = &self.settings;
        if let Some(name) = &s.name_override {
            metric.set_name(name.as_str());
        }
        if let Some(prefix) = &s.name_prefix {
            metric.add_prefix(prefix);
        }
        if let Some(suffix) = &s.name_suffix {
            metric.add_suffix(suffix);
        }

        for (key, value) in s.tags.iter().chain(s.global_tags.iter()) {
            if !metric.has_tag(key) {
                metric.set_tag(key.as_str(), value.as_str());
            }
        }
        metric.set_origin(s.origin.clone());

        let mut metric = s.filter.select(metric)?;
        if !metric.has_fields() {
            return None;
        }
        if let Some(precision) = s.precision {
            metric.truncate_timestamp(precision);
        }
        Some(metric)
    }
}

impl Accumulator for MetricAccumulator {
    fn add_metric(&self, metric: Metric) {
        let Some(metric) = self.complete(metric) else {
            return;
        };
        // Full or closed queue: count, never block
        let sent = match self.tx.read().as_ref() {
            Some(tx) => tx.try_send(metric).is_ok(),
            None => false,
        };
        if sent {
            self.metrics.record_gathered();
        } else {
            self.metrics.record_dropped();
        }
    }

    fn add_error(&self, error: anyhow::Error) {
        self.metrics.record_error();
        self.errors.error("collection failed", &error);
    }
}

impl std::fmt::Debug for MetricAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricAccumulator")
            .field("origin", &self.settings.origin)
            .field("precision", &self.settings.precision)
            .finish()
    }
}
