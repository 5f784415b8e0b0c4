//! Configuration error types

use std::io;

use tally_filter::FilterError;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A plugin block could not be decoded
    #[error("{component} '{name}' #{index}: {message}")]
    InvalidBlock {
        /// Component type (e.g., "input", "output")
        component: &'static str,
        /// Plugin name
        name: String,
        /// Position of the block among blocks of the same plugin
        index: usize,
        /// First decoding error
        message: String,
    },

    /// Validation error - required field missing
    #[error("{component} '{name}' is missing required field '{field}'")]
    MissingField {
        /// Component type (e.g., "input", "output")
        component: &'static str,
        /// Name of the component
        name: String,
        /// Missing field name
        field: &'static str,
    },

    /// Validation error - invalid value
    #[error("{component} '{name}' has invalid {field}: {message}")]
    InvalidValue {
        /// Component type
        component: &'static str,
        /// Name of the component
        name: String,
        /// Field name
        field: &'static str,
        /// Error message
        message: String,
    },

    /// Filter rules of a plugin do not compile
    #[error("{component} '{name}' has invalid filter: {source}")]
    InvalidFilter {
        /// Component type
        component: &'static str,
        /// Name of the component
        name: String,
        /// Compilation error
        #[source]
        source: FilterError,
    },

    /// No outputs declared
    #[error("no outputs are configured - at least one output must be declared")]
    NoOutputs,
}

impl ConfigError {
    /// Create an InvalidBlock error
    pub fn invalid_block(
        component: &'static str,
        name: impl Into<String>,
        index: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidBlock {
            component,
            name: name.into(),
            index,
            message: message.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(
        component: &'static str,
        name: impl Into<String>,
        field: &'static str,
    ) -> Self {
        Self::MissingField {
            component,
            name: name.into(),
            field,
        }
    }

    /// Create an InvalidValue error
    pub fn invalid_value(
        component: &'static str,
        name: impl Into<String>,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            component,
            name: name.into(),
            field,
            message: message.into(),
        }
    }

    /// Create an InvalidFilter error
    pub fn invalid_filter(
        component: &'static str,
        name: impl Into<String>,
        source: FilterError,
    ) -> Self {
        Self::InvalidFilter {
            component,
            name: name.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_block_error() {
        let err = ConfigError::invalid_block("input", "cpu", 1, "invalid type: string");
        let msg = err.to_string();
        assert!(msg.contains("input 'cpu' #1"));
        assert!(msg.contains("invalid type"));
    }

    #[test]
    fn test_missing_field_error() {
        let err = ConfigError::missing_field("input", "file", "files");
        assert!(err.to_string().contains("input"));
        assert!(err.to_string().contains("file"));
        assert!(err.to_string().contains("files"));
    }

    #[test]
    fn test_invalid_value_error() {
        let err = ConfigError::invalid_value(
            "output",
            "stdout",
            "metric_buffer_limit",
            "must be at least twice metric_batch_size",
        );
        assert!(err.to_string().contains("stdout"));
        assert!(err.to_string().contains("metric_buffer_limit"));
    }

    #[test]
    fn test_invalid_filter_error() {
        let source = FilterError::invalid_pattern("namepass", "cpu[", "invalid range");
        let err = ConfigError::invalid_filter("output", "stdout", source);
        assert!(err.to_string().contains("invalid filter"));
        assert!(err.to_string().contains("cpu["));
    }

    #[test]
    fn test_no_outputs() {
        assert!(ConfigError::NoOutputs.to_string().contains("no outputs"));
    }
}
