//! Human-readable metrics formatter
//!
//! # Example Output
//!
//! ```text
//! [metrics] totals: gathered 12.0K | written 11.9K | dropped 0 | flushes 240 (0 skipped)
//! [metrics] inputs: cpu (120/s) | file-0 (40/s, 1 err)
//! [metrics] outputs: stdout (160/s, 0.42ms avg) | file (160/s, 3 err, 12 dropped)
//! ```

use std::fmt::Write;

use super::{MetricsFormatter, format_count, format_rate};
use crate::{CollectedMetrics, MetricsRates};

/// Human-readable metrics formatter
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter;

impl HumanFormatter {
    pub fn new() -> Self {
        Self
    }

    fn format_totals(&self, metrics: &CollectedMetrics) -> String {
        let mut output = format!(
            "[metrics] totals: gathered {} | written {} | dropped {}",
            format_count(metrics.total_gathered()),
            format_count(metrics.total_written()),
            format_count(metrics.total_dropped()),
        );
        if let Some(dispatcher) = metrics.dispatcher {
            let _ = write!(
                output,
                " | flushes {} ({} skipped)",
                format_count(dispatcher.flushes_completed),
                dispatcher.flushes_skipped,
            );
        }
        output
    }

    fn format_inputs(&self, rates: &MetricsRates) -> Option<String> {
        if rates.inputs.is_empty() {
            return None;
        }

        let mut output = String::from("[metrics] inputs:");
        for (i, input) in rates.inputs.iter().enumerate() {
            if i > 0 {
                output.push_str(" |");
            }
            let _ = write!(output, " {} ({}", input.id, format_rate(input.metrics_per_sec));
            if input.errors > 0 {
                let _ = write!(output, ", {} err", input.errors);
            }
            if input.dropped > 0 {
                let _ = write!(output, ", {} dropped", input.dropped);
            }
            output.push(')');
        }
        Some(output)
    }

    fn format_outputs(&self, rates: &MetricsRates) -> Option<String> {
        if rates.outputs.is_empty() {
            return None;
        }

        let mut output = String::from("[metrics] outputs:");
        for (i, out) in rates.outputs.iter().enumerate() {
            if i > 0 {
                output.push_str(" |");
            }
            let avg_ms = out.avg_write_time.as_secs_f64() * 1000.0;
            let _ = write!(
                output,
                " {} ({}, {:.2}ms avg",
                out.id,
                format_rate(out.metrics_per_sec),
                avg_ms
            );
            if out.errors > 0 {
                let _ = write!(output, ", {} err", out.errors);
            }
            if out.dropped > 0 {
                let _ = write!(output, ", {} dropped", out.dropped);
            }
            output.push(')');
        }
        Some(output)
    }
}

impl MetricsFormatter for HumanFormatter {
    fn format(&self, metrics: &CollectedMetrics, rates: Option<&MetricsRates>) -> String {
        let mut lines = vec![self.format_totals(metrics)];

        if let Some(rates) = rates {
            lines.extend(self.format_inputs(rates));
            lines.extend(self.format_outputs(rates));
        }

        lines.join("\n")
    }
}
