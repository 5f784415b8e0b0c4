//! Report formatters
//!
//! One report per reporter tick, rendered as a single log line (human) or
//! a JSON object.

mod human;
mod json;

pub use human::HumanFormatter;
pub use json::JsonFormatter;

use crate::{CollectedMetrics, MetricsRates};

/// Renders a report from a snapshot and the rates since the previous one
pub trait MetricsFormatter: Send + Sync {
    /// Format one report; `rates` is None on the first report
    fn format(&self, metrics: &CollectedMetrics, rates: Option<&MetricsRates>) -> String;
}

/// Value scaled to one decimal with a K or M suffix, `None` below 1000
fn scaled(value: f64) -> Option<String> {
    match value {
        v if v >= 1e6 => Some(format!("{:.1}M", v / 1e6)),
        v if v >= 1e3 => Some(format!("{:.1}K", v / 1e3)),
        _ => None,
    }
}

/// Counter value for display: `950`, `1.5K`, `2.0M`
pub fn format_count(count: u64) -> String {
    scaled(count as f64).unwrap_or_else(|| count.to_string())
}

/// Per-second rate for display: `12/s`, `1.5K/s`
pub fn format_rate(rate: f64) -> String {
    match scaled(rate) {
        Some(s) => format!("{s}/s"),
        None => format!("{rate:.0}/s"),
    }
}
