//! Output error types

use tally_config::ConfigError;
use thiserror::Error;

/// Errors raised while building outputs
#[derive(Debug, Error)]
pub enum OutputError {
    /// Plugin options did not decode
    #[error(transparent)]
    Options(#[from] ConfigError),

    /// Invalid plugin configuration
    #[error("output '{output}': {message}")]
    Config { output: String, message: String },

    /// No factory registered under this name
    #[error("unknown output '{name}', available: [{available}]")]
    UnknownPlugin { name: String, available: String },
}

impl OutputError {
    pub fn config(output: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            output: output.into(),
            message: message.into(),
        }
    }
}

/// Result type for output construction
pub type Result<T> = std::result::Result<T, OutputError>;
