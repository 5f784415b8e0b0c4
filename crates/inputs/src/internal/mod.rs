//! Internal Input - The agent's own counters as metrics
//!
//! ```toml
//! [[inputs.internal]]
//! summary_only = false
//! ```
//!
//! | Measurement | Tags | One per |
//! |-------------|------|---------|
//! | `internal_agent` | | agent |
//! | `internal_gather` | `input`, `alias` | input |
//! | `internal_write` | `output`, `alias` | output |
//! | `internal_aggregate` | `aggregator`, `alias` | aggregator |
//!
//! All fields are cumulative unsigned counters. Metrics from this plugin
//! route to the well-known agent destination.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tally_config::{PluginKind, decode_options};
use tally_metric::FieldValue;
use tally_metrics::MetricsHub;

use crate::registry::{InputContext, InputFactory};
use crate::{Accumulator, Fields, Input, InputKind, Result, Tags};

/// Options of the `internal` input
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InternalConfig {
    /// Emit only `internal_agent`
    pub summary_only: bool,
}

/// Reads every registered component's counters
#[derive(Debug, Clone)]
pub struct InternalInput {
    hub: Arc<MetricsHub>,
    summary_only: bool,
}

impl InternalInput {
    pub fn new(hub: Arc<MetricsHub>, config: InternalConfig) -> Self {
        Self {
            hub,
            summary_only: config.summary_only,
        }
    }
}

fn counters<const N: usize>(values: [(&str, u64); N]) -> Fields {
    values
        .into_iter()
        .map(|(key, value)| (key.to_string(), FieldValue::UInt(value)))
        .collect()
}

fn identity(kind: &str, plugin: &str, id: &str) -> Tags {
    Tags::from([
        (kind.to_string(), plugin.to_string()),
        ("alias".to_string(), id.to_string()),
    ])
}

#[async_trait]
impl Input for InternalInput {
    async fn gather(&self, acc: &dyn Accumulator) -> anyhow::Result<()> {
        let collected = self.hub.collect();
        let now = Some(Utc::now());

        let mut agent = counters([
            ("metrics_gathered", collected.total_gathered()),
            ("metrics_written", collected.total_written()),
            ("metrics_dropped", collected.total_dropped()),
        ]);
        if let Some(d) = collected.dispatcher {
            agent.extend(counters([
                ("flushes_enqueued", d.flushes_enqueued),
                ("flushes_skipped", d.flushes_skipped),
                ("flushes_completed", d.flushes_completed),
            ]));
        }
        acc.add_counter("internal_agent", agent, Tags::new(), now);

        if self.summary_only {
            return Ok(());
        }

        for input in &collected.inputs {
            let s = &input.snapshot;
            acc.add_counter(
                "internal_gather",
                counters([
                    ("gathers", s.gathers),
                    ("gather_errors", s.gather_errors),
                    ("metrics_gathered", s.metrics_gathered),
                    ("metrics_dropped", s.metrics_dropped),
                    ("gather_time_ns", s.gather_time_ns),
                ]),
                identity("input", &input.kind, &input.id),
                now,
            );
        }

        for output in &collected.outputs {
            let s = &output.snapshot;
            acc.add_counter(
                "internal_write",
                counters([
                    ("metrics_added", s.metrics_added),
                    ("metrics_filtered", s.metrics_filtered),
                    ("metrics_dropped", s.metrics_dropped),
                    ("metrics_written", s.metrics_written),
                    ("batches_written", s.batches_written),
                    ("write_errors", s.write_errors),
                    ("write_time_ns", s.write_time_ns),
                    ("destinations", s.destinations),
                ]),
                identity("output", &output.kind, &output.id),
                now,
            );
        }

        for aggregator in &collected.aggregators {
            let s = &aggregator.snapshot;
            acc.add_counter(
                "internal_aggregate",
                counters([
                    ("metrics_added", s.metrics_added),
                    ("metrics_out_of_window", s.metrics_out_of_window),
                    ("metrics_pushed", s.metrics_pushed),
                    ("pushes", s.pushes),
                    ("errors", s.errors),
                ]),
                identity("aggregator", &aggregator.kind, &aggregator.id),
                now,
            );
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "internal"
    }
}

/// Factory for the `internal` input
pub struct InternalFactory;

impl InputFactory for InternalFactory {
    fn create(&self, options: &toml::Table, context: &InputContext) -> Result<InputKind> {
        let config: InternalConfig = decode_options(PluginKind::Input, "internal", options)?;
        Ok(InputKind::Polled(Box::new(InternalInput::new(
            Arc::clone(&context.hub),
            config,
        ))))
    }

    fn name(&self) -> &'static str {
        "internal"
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
