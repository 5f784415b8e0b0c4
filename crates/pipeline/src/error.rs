//! Pipeline error types

use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Output failed to connect
    #[error("output {output}: connect failed: {source}")]
    Connect {
        output: String,
        #[source]
        source: anyhow::Error,
    },

    /// Output failed to release its resources
    #[error("output {output}: close failed: {source}")]
    Close {
        output: String,
        #[source]
        source: anyhow::Error,
    },

    /// Metrics were still buffered when the shutdown drain timed out
    #[error("shutdown drain timed out with {remaining} metrics buffered")]
    DrainTimeout { remaining: usize },
}

impl PipelineError {
    pub fn connect(output: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Connect {
            output: output.into(),
            source,
        }
    }

    pub fn close(output: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Close {
            output: output.into(),
            source,
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
