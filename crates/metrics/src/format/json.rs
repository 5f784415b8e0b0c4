//! JSON metrics formatter
//!
//! Emits one JSON object per report with cumulative counters and, from the
//! second report on, per-second rates.

use serde::Serialize;

use super::MetricsFormatter;
use crate::{
    AggregatorMetricsSnapshot, CollectedMetrics, DispatcherSnapshot, InputMetricsSnapshot,
    MetricsRates, Named, OutputMetricsSnapshot,
};

/// JSON metrics formatter
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize)]
struct ReportJson<'a> {
    #[serde(rename = "type")]
    report_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dispatcher: Option<DispatcherSnapshot>,
    inputs: &'a [Named<InputMetricsSnapshot>],
    outputs: &'a [Named<OutputMetricsSnapshot>],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    aggregators: &'a [Named<AggregatorMetricsSnapshot>],
    #[serde(skip_serializing_if = "Option::is_none")]
    rates: Option<RatesJson<'a>>,
}

#[derive(Serialize)]
struct RatesJson<'a> {
    elapsed_ms: u64,
    inputs: Vec<RateJson<'a>>,
    outputs: Vec<RateJson<'a>>,
}

#[derive(Serialize)]
struct RateJson<'a> {
    id: &'a str,
    metrics_per_sec: u64,
    errors: u64,
    dropped: u64,
}

impl MetricsFormatter for JsonFormatter {
    fn format(&self, metrics: &CollectedMetrics, rates: Option<&MetricsRates>) -> String {
        let report = ReportJson {
            report_type: "agent",
            dispatcher: metrics.dispatcher,
            inputs: &metrics.inputs,
            outputs: &metrics.outputs,
            aggregators: &metrics.aggregators,
            rates: rates.map(|r| RatesJson {
                elapsed_ms: r.elapsed.as_millis() as u64,
                inputs: r
                    .inputs
                    .iter()
                    .map(|i| RateJson {
                        id: &i.id,
                        metrics_per_sec: i.metrics_per_sec as u64,
                        errors: i.errors,
                        dropped: i.dropped,
                    })
                    .collect(),
                outputs: r
                    .outputs
                    .iter()
                    .map(|o| RateJson {
                        id: &o.id,
                        metrics_per_sec: o.metrics_per_sec as u64,
                        errors: o.errors,
                        dropped: o.dropped,
                    })
                    .collect(),
            }),
        };

        serde_json::to_string(&report).unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
    }
}
