//! Transform error types
//!
//! Errors raised while building or running processors and aggregators.

use tally_config::ConfigError;
use thiserror::Error;

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

/// Errors that can occur in the transform stage
#[derive(Debug, Error)]
pub enum TransformError {
    /// Processing one metric failed
    #[error("transform failed: {0}")]
    TransformFailed(String),

    /// Plugin code panicked
    #[error("plugin panicked: {0}")]
    Panicked(String),

    /// Invalid plugin configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Plugin options did not decode
    #[error(transparent)]
    Options(#[from] ConfigError),

    /// No factory registered under this name
    #[error("unknown {kind} '{name}', available: [{available}]")]
    UnknownPlugin {
        kind: &'static str,
        name: String,
        available: String,
    },
}

impl TransformError {
    /// Create a transform failed error
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::TransformFailed(msg.into())
    }

    /// Create an error from a caught panic message
    pub fn panicked(msg: impl Into<String>) -> Self {
        Self::Panicked(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an unknown plugin error listing what is registered
    pub fn unknown(kind: &'static str, name: impl Into<String>, available: &[&str]) -> Self {
        Self::UnknownPlugin {
            kind,
            name: name.into(),
            available: available.join(", "),
        }
    }
}
