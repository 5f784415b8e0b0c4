//! Rate-limited error logging
//!
//! A failing output or input can hit the same error on every flush or
//! gather. The logger emits at most one event per interval and reports how
//! many were suppressed since the last one.
//!
//! # Example
//!
//! ```ignore
//! let logger = RateLimitedLogger::new("file", DEFAULT_LOG_INTERVAL);
//!
//! for _ in 0..1000 {
//!     logger.error("write failed", &err); // logs once
//! }
//! ```

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Default interval between logged errors
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Logs at most once per interval, counting the rest
pub struct RateLimitedLogger {
    /// Plugin instance the errors belong to
    plugin: String,

    min_interval: Duration,

    last_log_time: Mutex<Option<Instant>>,

    /// Errors since the last logged one
    error_count: AtomicU64,

    total_errors: AtomicU64,
}

impl RateLimitedLogger {
    pub fn new(plugin: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            plugin: plugin.into(),
            min_interval,
            last_log_time: Mutex::new(None),
            error_count: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
        }
    }

    /// Record an error and log it if the interval has passed
    ///
    /// Returns true if the error was logged.
    pub fn error(&self, message: &str, error: &dyn Display) -> bool {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        let total = self.total_errors.fetch_add(1, Ordering::Relaxed) + 1;

        if !self.should_log() {
            return false;
        }

        let count = self.error_count.swap(0, Ordering::Relaxed);
        if count > 1 {
            tracing::error!(
                plugin = %self.plugin,
                error = %error,
                suppressed_count = count - 1,
                total_errors = total,
                "{message} (rate-limited)"
            );
        } else {
            tracing::error!(
                plugin = %self.plugin,
                error = %error,
                total_errors = total,
                "{message}"
            );
        }
        true
    }

    fn should_log(&self) -> bool {
        let mut last_time = self.last_log_time.lock();
        let now = Instant::now();
        match *last_time {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                *last_time = Some(now);
                true
            }
        }
    }

    /// Errors recorded since the last logged one
    pub fn pending_error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn total_error_count(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RateLimitedLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedLogger")
            .field("plugin", &self.plugin)
            .field("min_interval", &self.min_interval)
            .field("total_errors", &self.total_error_count())
            .finish()
    }
}
