//! Routing error types

use thiserror::Error;

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Errors that can occur while resolving destinations
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The cache already holds its maximum number of destinations
    #[error("destination limit of {limit} reached, cannot create '{key}'")]
    LimitReached {
        /// Configured maximum
        limit: usize,
        /// Key that could not be created (display form)
        key: String,
    },
}

impl RoutingError {
    /// Create a LimitReached error
    #[inline]
    pub fn limit_reached(limit: usize, key: impl Into<String>) -> Self {
        Self::LimitReached {
            limit,
            key: key.into(),
        }
    }
}
