//! Tally - Outputs
//!
//! Built-in sinks implementing the pipeline's [`Output`] contract.
//!
//! | Plugin | Writes |
//! |--------|--------|
//! | `discard` | nothing; counts batches |
//! | `stdout` | line protocol to standard output |
//! | `file` | line protocol appended to a file, or one file per destination |
//!
//! Batching, buffering and flush timing live in `tally-pipeline`; an
//! output only sees finished batches.
//!
//! # Example
//!
//! ```ignore
//! let registry = OutputRegistry::with_builtins();
//! let sink = registry.create("file", &options)?;
//! let output = RunningOutput::new(settings, sink, dispatcher.clone());
//! ```

mod error;
pub mod discard;
pub mod file;
pub mod registry;
pub mod stdout;

pub use error::{OutputError, Result};
pub use registry::{OutputFactory, OutputRegistry, register_builtin_outputs};
pub use tally_pipeline::Output;

use tally_metric::{Metric, write_metric};

/// Line protocol for a batch, one metric per line
pub fn encode_batch(metrics: &[Metric]) -> String {
    let mut out = String::with_capacity(metrics.len() * 64);
    for metric in metrics {
        write_metric(&mut out, metric);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_encode_batch() {
        let ts = DateTime::from_timestamp_nanos(1_700_000_000_000_000_000);
        let batch = vec![
            Metric::new("cpu", ts).with_tag("host", "a").with_field("idle", 10.5),
            Metric::new("mem", ts).with_field("used", 3i64),
        ];
        assert_eq!(
            encode_batch(&batch),
            "cpu,host=a idle=10.5 1700000000000000000\nmem used=3i 1700000000000000000\n"
        );
        assert!(encode_batch(&[]).is_empty());
    }
}
