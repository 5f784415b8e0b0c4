//! Shared helpers for pipeline tasks

mod jitter;
mod panic;
mod rate_limited_logger;

pub use jitter::{jittered, random_jitter};
pub use panic::{catch_panic, catch_panic_sync, panic_message};
pub use rate_limited_logger::{DEFAULT_LOG_INTERVAL, RateLimitedLogger};
