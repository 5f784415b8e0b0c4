//! Filter error types

use thiserror::Error;

/// Result type for filter compilation
pub type Result<T> = std::result::Result<T, FilterError>;

/// Errors raised while compiling filter rules
#[derive(Debug, Error)]
pub enum FilterError {
    /// A pattern is not a valid glob
    #[error("invalid {class} pattern '{pattern}': {message}")]
    InvalidPattern {
        /// Rule class the pattern belongs to (e.g. "namepass")
        class: &'static str,
        /// The offending pattern
        pattern: String,
        /// Parser message
        message: String,
    },
}

impl FilterError {
    /// Create an InvalidPattern error
    pub fn invalid_pattern(
        class: &'static str,
        pattern: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidPattern {
            class,
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}
