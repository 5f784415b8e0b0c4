//! Input error types

use tally_config::ConfigError;
use tally_metric::MetricError;
use thiserror::Error;

/// Errors raised while building or starting inputs
#[derive(Debug, Error)]
pub enum InputError {
    /// Invalid plugin configuration
    #[error("input '{input}': {message}")]
    Config { input: String, message: String },

    /// Plugin options did not decode
    #[error(transparent)]
    Options(#[from] ConfigError),

    /// Unknown `data_format`
    #[error(transparent)]
    Parser(#[from] MetricError),

    /// No factory registered under this name
    #[error("unknown input '{name}', available: [{available}]")]
    UnknownPlugin { name: String, available: String },

    /// `init` failed
    #[error("input '{input}': init failed: {source}")]
    Init {
        input: String,
        #[source]
        source: anyhow::Error,
    },

    /// A service input failed to start
    #[error("input '{input}': start failed: {source}")]
    Start {
        input: String,
        #[source]
        source: anyhow::Error,
    },
}

impl InputError {
    pub fn config(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            input: input.into(),
            message: message.into(),
        }
    }

    pub fn init(input: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Init {
            input: input.into(),
            source,
        }
    }

    pub fn start(input: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Start {
            input: input.into(),
            source,
        }
    }
}

/// Result type for input operations
pub type Result<T> = std::result::Result<T, InputError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InputError::config("file", "files is empty");
        assert_eq!(err.to_string(), "input 'file': files is empty");

        let err = InputError::start("udp_listener", anyhow::anyhow!("address in use"));
        assert_eq!(
            err.to_string(),
            "input 'udp_listener': start failed: address in use"
        );

        let err = InputError::from(MetricError::UnknownFormat("csv".into()));
        assert!(err.to_string().contains("csv"));
    }
}
