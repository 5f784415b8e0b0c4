//! Metric error types

use thiserror::Error;

/// Result type for metric operations
pub type Result<T> = std::result::Result<T, MetricError>;

/// Errors produced while parsing or building metrics
#[derive(Debug, Error)]
pub enum MetricError {
    /// A line could not be parsed
    #[error("line {line_no}: {message}")]
    Parse {
        /// 1-based line number within the input
        line_no: usize,
        /// What went wrong
        message: String,
    },

    /// Requested data format has no parser
    #[error("unknown data format '{0}'")]
    UnknownFormat(String),
}

impl MetricError {
    /// Create a Parse error
    pub fn parse(line_no: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line_no,
            message: message.into(),
        }
    }
}
