//! Tally - Transform
//!
//! Processors and aggregators between collection and dispatch.
//!
//! # Overview
//!
//! - **Processors** reshape one metric at a time. They run in a strict
//!   order: ascending `order`, ties kept in declaration order.
//! - **Aggregators** fold metrics into per-series state over a time window
//!   and emit summary metrics when the window closes.
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────────────────┐   originals (unless drop_original)
//! [metric] ──►   │ processors (copy A)  │ ─────────────────────────────────────► outputs
//!                └──────────┬───────────┘
//!                           ▼
//!                   [aggregators] ── push at window end + delay
//!                           │
//!                           ▼
//!                ┌──────────────────────┐
//!                │ processors (copy B)  │ ─────────────────────────────────────► outputs
//!                └──────────────────────┘
//! ```
//!
//! The two processor chains are built from separate factory calls and share
//! no state.
//!
//! # Adding a Processor
//!
//! 1. Define an options struct deriving `Deserialize`.
//! 2. Implement [`Processor`] on the plugin.
//! 3. Implement [`ProcessorFactory`] decoding the options with
//!    [`tally_config::decode_options`].
//! 4. Register the factory in [`register_builtin_processors`].
//!
//! # Example
//!
//! ```ignore
//! let registry = ProcessorRegistry::with_builtins();
//! let processor = registry.create("rename", &options)?;
//!
//! let chain = ProcessorChain::new(vec![RunningProcessor::new(settings, processor)]);
//! let out = chain.apply(metric).await;
//! ```

mod aggregator;
mod chain;
mod error;
pub mod count;
pub mod minmax;
pub mod name_override;
pub mod noop;
pub mod registry;
pub mod rename;

pub use aggregator::{AggregatorMetricsHandle, AggregatorSettings, RunningAggregator};
pub use chain::{ProcessorChain, ProcessorSettings, RunningProcessor};
pub use error::TransformError;
pub use registry::{
    AggregatorFactory, AggregatorRegistry, ProcessorFactory, ProcessorRegistry,
    register_builtin_aggregators, register_builtin_processors,
};

use std::future::Future;
use std::pin::Pin;

use tally_metric::Metric;

/// Result type for transform operations
pub type TransformResult<T> = Result<T, TransformError>;

/// Per-metric transform
///
/// Implementors must be `Send + Sync`; one instance serves one chain and
/// may be called from the task driving that chain.
///
/// # Example
///
/// ```ignore
/// struct Upper;
///
/// impl Processor for Upper {
///     fn process<'a>(
///         &'a self,
///         mut metric: Metric,
///     ) -> Pin<Box<dyn Future<Output = TransformResult<Vec<Metric>>> + Send + 'a>> {
///         Box::pin(async move {
///             let name = metric.name().to_uppercase();
///             metric.set_name(name);
///             Ok(vec![metric])
///         })
///     }
///
///     fn name(&self) -> &'static str {
///         "upper"
///     }
/// }
/// ```
pub trait Processor: Send + Sync {
    /// Process one metric
    ///
    /// Return an empty vector to drop the metric, or several to split it.
    /// An error drops only this metric.
    fn process<'a>(
        &'a self,
        metric: Metric,
    ) -> Pin<Box<dyn Future<Output = TransformResult<Vec<Metric>>> + Send + 'a>>;

    /// Plugin name for logging
    fn name(&self) -> &'static str;

    /// Release resources at shutdown
    fn close<'a>(&'a self) -> Pin<Box<dyn Future<Output = TransformResult<()>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }
}

/// Stateful, windowed fold over metrics
///
/// The [`RunningAggregator`] owns windowing and locking; implementations
/// only keep per-series state.
pub trait Aggregator: Send {
    /// Fold a metric into the state of its series
    fn add(&mut self, metric: &Metric);

    /// Emit one summary metric per series seen since the last reset
    ///
    /// Timestamps are set by the caller.
    fn push(&mut self) -> Vec<Metric>;

    /// Forget all series state
    fn reset(&mut self);

    /// Plugin name for logging
    fn name(&self) -> &'static str;
}
