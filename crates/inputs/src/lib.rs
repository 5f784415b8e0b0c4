//! Tally - Inputs
//!
//! Collection scheduling and the input plugin contracts.
//!
//! # Capabilities
//!
//! Every input resolves once, at construction, into one [`InputKind`]:
//!
//! | Variant | Contract | Driven by |
//! |---------|----------|-----------|
//! | `Polled` | [`Input::gather`] | scheduler, every interval |
//! | `Parser` | [`ParserInput`]: a polled input that decodes raw data | scheduler |
//! | `Service` | [`ServiceInput::start`] / [`ServiceInput::stop`] | its own I/O |
//!
//! # Architecture
//!
//! ```text
//! RunningInput ── tick (interval, optional wall-clock alignment)
//!      │           └─ sleep random [0, collection_jitter)
//!      ▼
//!  gather(acc) ──► MetricAccumulator ──► name/tags ──► filter ──► precision ──► ingest queue
//!                        │
//!                        └─ add_error ──► counted + rate-limited log
//! ```
//!
//! A slow gather only delays its own next tick; every input has its own
//! task.
//!
//! # Example
//!
//! ```ignore
//! let registry = InputRegistry::with_builtins();
//! let kind = registry.create("constant", &options, &context)?;
//!
//! let input = Arc::new(RunningInput::new(settings, kind, ingest_tx)?);
//! tokio::spawn(Arc::clone(&input).run(cancel.child_token()));
//! ```

mod accumulator;
mod error;
mod precision;
mod scheduler;
pub mod constant;
pub mod file;
pub mod internal;
pub mod registry;
pub mod udp_listener;

pub use accumulator::{Accumulator, AccumulatorSettings, Fields, MetricAccumulator, Tags};
pub use error::{InputError, Result};
pub use precision::{derive_precision, effective_precision};
pub use registry::{InputContext, InputFactory, InputRegistry, register_builtin_inputs};
pub use scheduler::{InputMetricsHandle, InputSettings, InputState, RunningInput, first_tick_delay};

use std::sync::Arc;

use async_trait::async_trait;
use tally_metric::Parser;

/// A polled input
#[async_trait]
pub trait Input: Send + Sync {
    /// One-time setup, run before scheduling begins
    fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Collect once, feeding metrics to the accumulator
    ///
    /// An error is reported through the accumulator's error channel; the
    /// next collection still happens on schedule.
    async fn gather(&self, acc: &dyn Accumulator) -> anyhow::Result<()>;

    /// Plugin name
    fn name(&self) -> &'static str;
}

/// A polled input that decodes raw data with a configured parser
pub trait ParserInput: Input {
    fn set_parser(&mut self, parser: Box<dyn Parser>);
}

/// A long-running, push-style input
#[async_trait]
pub trait ServiceInput: Send + Sync {
    fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Start producing metrics; returns once the service is running
    async fn start(&self, acc: Arc<dyn Accumulator>) -> anyhow::Result<()>;

    /// Stop producing metrics and release resources
    async fn stop(&self);

    /// Optional periodic collection alongside the service
    async fn gather(&self, _acc: &dyn Accumulator) -> anyhow::Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// An input plugin resolved to its capability
pub enum InputKind {
    Polled(Box<dyn Input>),
    Parser(Box<dyn ParserInput>),
    Service(Box<dyn ServiceInput>),
}

impl InputKind {
    /// Plugin name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Polled(input) => input.name(),
            Self::Parser(input) => input.name(),
            Self::Service(input) => input.name(),
        }
    }

    #[inline]
    pub fn is_service(&self) -> bool {
        matches!(self, Self::Service(_))
    }

    fn init(&mut self) -> anyhow::Result<()> {
        match self {
            Self::Polled(input) => input.init(),
            Self::Parser(input) => input.init(),
            Self::Service(input) => input.init(),
        }
    }

    async fn gather(&self, acc: &dyn Accumulator) -> anyhow::Result<()> {
        match self {
            Self::Polled(input) => input.gather(acc).await,
            Self::Parser(input) => input.gather(acc).await,
            Self::Service(input) => input.gather(acc).await,
        }
    }
}

impl std::fmt::Debug for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            Self::Polled(_) => "Polled",
            Self::Parser(_) => "Parser",
            Self::Service(_) => "Service",
        };
        f.debug_tuple(variant).field(&self.name()).finish()
    }
}
