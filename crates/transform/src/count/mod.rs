//! Count Aggregator - Samples per series
//!
//! Emits one metric per series with a `count` field holding the number of
//! metrics seen in the window.

use std::collections::HashMap;

use tally_metric::{FieldValue, Metric};

use crate::registry::AggregatorFactory;
use crate::{Aggregator, TransformResult};

#[derive(Debug, Default)]
pub struct CountAggregator {
    series: HashMap<u64, (Metric, u64)>,
    order: Vec<u64>,
}

impl CountAggregator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aggregator for CountAggregator {
    fn add(&mut self, metric: &Metric) {
        let id = metric.series_id();
        let (_, count) = self.series.entry(id).or_insert_with(|| {
            self.order.push(id);
            let template = Metric::from_parts(
                metric.name(),
                metric.tags().clone(),
                std::iter::empty::<(String, FieldValue)>(),
                metric.timestamp(),
            )
            .with_origin(metric.origin().clone());
            (template, 0)
        });
        *count += 1;
    }

    fn push(&mut self) -> Vec<Metric> {
        self.order
            .iter()
            .filter_map(|id| self.series.get(id))
            .map(|(template, count)| template.clone().with_field("count", *count))
            .collect()
    }

    fn reset(&mut self) {
        self.series.clear();
        self.order.clear();
    }

    fn name(&self) -> &'static str {
        "count"
    }
}

/// Factory for [`CountAggregator`]
pub struct CountFactory;

impl AggregatorFactory for CountFactory {
    fn create(&self, _options: &toml::Table) -> TransformResult<Box<dyn Aggregator>> {
        Ok(Box::new(CountAggregator::new()))
    }

    fn name(&self) -> &'static str {
        "count"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_counts_per_series() {
        let now = Utc::now();
        let mut agg = CountAggregator::new();
        for host in ["a", "a", "b", "a"] {
            agg.add(&Metric::new("cpu", now).with_tag("host", host).with_field("v", 1.0));
        }

        let out = agg.push();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].tag("host"), Some("a"));
        assert_eq!(out[0].field("count"), Some(&FieldValue::UInt(3)));
        assert_eq!(out[1].field("count"), Some(&FieldValue::UInt(1)));

        agg.reset();
        assert!(agg.push().is_empty());
    }
}
