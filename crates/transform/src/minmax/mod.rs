//! MinMax Aggregator - Per-series minimum and maximum
//!
//! For every numeric field of a series, emits `<field>_min` and
//! `<field>_max` once per window. Non-numeric fields are ignored.
//!
//! ```toml
//! [[aggregators.minmax]]
//! period = "30s"
//! drop_original = true
//! ```

use std::collections::HashMap;

use tally_metric::{FieldValue, Metric};

use crate::registry::AggregatorFactory;
use crate::{Aggregator, TransformResult};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

#[derive(Debug)]
struct Extremes {
    min: f64,
    max: f64,
}

/// State of one series
#[derive(Debug)]
struct SeriesState {
    /// Name, tags and origin of the first metric seen
    template: Metric,
    /// Field extremes in first-seen order
    fields: Vec<(String, Extremes)>,
}

impl SeriesState {
    fn new(metric: &Metric) -> Self {
        let template = Metric::from_parts(
            metric.name(),
            metric.tags().clone(),
            std::iter::empty::<(String, FieldValue)>(),
            metric.timestamp(),
        )
        .with_origin(metric.origin().clone());
        Self {
            template,
            fields: Vec::new(),
        }
    }

    fn add(&mut self, metric: &Metric) {
        for (key, value) in metric.fields() {
            let Some(v) = value.as_f64() else { continue };
            match self.fields.iter_mut().find(|(k, _)| k == key) {
                Some((_, e)) => {
                    e.min = e.min.min(v);
                    e.max = e.max.max(v);
                }
                None => self.fields.push((key.clone(), Extremes { min: v, max: v })),
            }
        }
    }

    fn to_metric(&self) -> Option<Metric> {
        if self.fields.is_empty() {
            return None;
        }
        let mut metric = self.template.clone();
        for (key, e) in &self.fields {
            metric.set_field(format!("{key}_min"), e.min);
            metric.set_field(format!("{key}_max"), e.max);
        }
        Some(metric)
    }
}

/// Tracks per-series field extremes
#[derive(Debug, Default)]
pub struct MinMaxAggregator {
    series: HashMap<u64, SeriesState>,
    /// Series ids in first-seen order
    order: Vec<u64>,
}

impl MinMaxAggregator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aggregator for MinMaxAggregator {
    fn add(&mut self, metric: &Metric) {
        let id = metric.series_id();
        let state = self.series.entry(id).or_insert_with(|| {
            self.order.push(id);
            SeriesState::new(metric)
        });
        state.add(metric);
    }

    fn push(&mut self) -> Vec<Metric> {
        self.order
            .iter()
            .filter_map(|id| self.series.get(id))
            .filter_map(SeriesState::to_metric)
            .collect()
    }

    fn reset(&mut self) {
        self.series.clear();
        self.order.clear();
    }

    fn name(&self) -> &'static str {
        "minmax"
    }
}

/// Factory for [`MinMaxAggregator`]
pub struct MinMaxFactory;

impl AggregatorFactory for MinMaxFactory {
    fn create(&self, _options: &toml::Table) -> TransformResult<Box<dyn Aggregator>> {
        Ok(Box::new(MinMaxAggregator::new()))
    }

    fn name(&self) -> &'static str {
        "minmax"
    }
}
