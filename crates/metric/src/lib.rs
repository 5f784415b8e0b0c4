//! Tally Metric - Core data model
//!
//! A [`Metric`] is a named measurement with a unique set of tags, an ordered
//! set of unique fields, a timestamp and a semantic type. Every metric also
//! carries its [`Origin`]: the plugin and configured instance that produced it.
//!
//! # Identity
//!
//! A metric's series identity is a stable hash over its name and tag set
//! ([`Metric::series_id`]). Aggregators key per-series state by it.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use tally_metric::{Metric, MetricType};
//!
//! let metric = Metric::new("cpu", Utc::now())
//!     .with_tag("host", "x")
//!     .with_field("idle", 10.0)
//!     .with_type(MetricType::Gauge);
//!
//! assert_eq!(metric.field("idle").and_then(|v| v.as_f64()), Some(10.0));
//! ```

mod error;
mod field;
pub mod line_protocol;
mod metric;

pub use error::{MetricError, Result};
pub use field::FieldValue;
pub use line_protocol::{LineProtocolParser, Parser, parser_for, serialize, write_metric};
pub use metric::{Metric, MetricType, Origin};
