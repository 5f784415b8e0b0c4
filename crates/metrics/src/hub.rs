//! Shared registry of metrics providers
//!
//! Components register their handles once at startup; readers call
//! [`MetricsHub::collect`] whenever they need a snapshot.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    AggregatorMetricsProvider, CollectedMetrics, DispatcherMetricsProvider, InputMetricsProvider,
    Named, OutputMetricsProvider,
};

#[derive(Default)]
pub struct MetricsHub {
    inputs: RwLock<Vec<Arc<dyn InputMetricsProvider>>>,
    outputs: RwLock<Vec<Arc<dyn OutputMetricsProvider>>>,
    aggregators: RwLock<Vec<Arc<dyn AggregatorMetricsProvider>>>,
    dispatcher: RwLock<Option<Arc<dyn DispatcherMetricsProvider>>>,
}

impl MetricsHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input(&self, provider: Arc<dyn InputMetricsProvider>) {
        self.inputs.write().push(provider);
    }

    pub fn add_output(&self, provider: Arc<dyn OutputMetricsProvider>) {
        self.outputs.write().push(provider);
    }

    pub fn add_aggregator(&self, provider: Arc<dyn AggregatorMetricsProvider>) {
        self.aggregators.write().push(provider);
    }

    pub fn set_dispatcher(&self, provider: Arc<dyn DispatcherMetricsProvider>) {
        *self.dispatcher.write() = Some(provider);
    }

    /// Snapshot every registered provider, in registration order
    pub fn collect(&self) -> CollectedMetrics {
        let mut metrics = CollectedMetrics::new();

        metrics.dispatcher = self
            .dispatcher
            .read()
            .as_ref()
            .map(|d| d.dispatcher_snapshot());

        metrics.inputs = self
            .inputs
            .read()
            .iter()
            .map(|p| Named::new(p.input_id(), p.input_type(), p.snapshot()))
            .collect();

        metrics.outputs = self
            .outputs
            .read()
            .iter()
            .map(|p| Named::new(p.output_id(), p.output_type(), p.snapshot()))
            .collect();

        metrics.aggregators = self
            .aggregators
            .read()
            .iter()
            .map(|p| Named::new(p.aggregator_id(), p.aggregator_type(), p.snapshot()))
            .collect();

        metrics
    }
}

impl std::fmt::Debug for MetricsHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsHub")
            .field("inputs", &self.inputs.read().len())
            .field("outputs", &self.outputs.read().len())
            .field("aggregators", &self.aggregators.read().len())
            .field("dispatcher", &self.dispatcher.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DispatcherMetrics, DispatcherSnapshot, InputMetrics, InputMetricsSnapshot};

    struct TestInput {
        metrics: InputMetrics,
    }

    impl InputMetricsProvider for TestInput {
        fn input_id(&self) -> &str {
            "cpu-0"
        }
        fn input_type(&self) -> &str {
            "cpu"
        }
        fn snapshot(&self) -> InputMetricsSnapshot {
            self.metrics.snapshot()
        }
    }

    struct TestDispatcher(DispatcherMetrics);

    impl DispatcherMetricsProvider for TestDispatcher {
        fn dispatcher_snapshot(&self) -> DispatcherSnapshot {
            self.0.snapshot()
        }
    }

    #[test]
    fn test_collect_empty() {
        let hub = MetricsHub::new();
        let metrics = hub.collect();
        assert!(metrics.timestamp.is_some());
        assert!(metrics.dispatcher.is_none());
        assert!(metrics.inputs.is_empty());
    }

    #[test]
    fn test_collect_reads_live_counters() {
        let hub = MetricsHub::new();
        let input = Arc::new(TestInput {
            metrics: InputMetrics::new(),
        });
        hub.add_input(input.clone());
        let dispatcher = Arc::new(TestDispatcher(DispatcherMetrics::new()));
        hub.set_dispatcher(dispatcher.clone());

        input.metrics.record_gathered();
        dispatcher.0.record_skipped();

        let metrics = hub.collect();
        assert_eq!(metrics.inputs.len(), 1);
        assert_eq!(metrics.inputs[0].id, "cpu-0");
        assert_eq!(metrics.inputs[0].kind, "cpu");
        assert_eq!(metrics.inputs[0].snapshot.metrics_gathered, 1);
        assert_eq!(metrics.dispatcher.unwrap().flushes_skipped, 1);
    }
}
