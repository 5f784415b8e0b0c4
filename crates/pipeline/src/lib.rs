//! Tally - Pipeline
//!
//! Per-destination buffering and the flush worker pool.
//!
//! # Architecture
//!
//! ```text
//!                      RunningOutput
//! metric ──► filter ──► router ──► Destination ──► MetricBuffer (bounded, evict oldest)
//!                                      │
//!                          flush timer │ interval + jitter, or batch full
//!                                      ▼
//!                              Dispatcher queue ──► N workers ──► Output::write
//! ```
//!
//! # Key Design
//!
//! - **Bounded memory**: buffers evict the oldest metric when full; the
//!   eviction is counted, not logged
//! - **Non-blocking producers**: routing and buffering never wait on a sink
//! - **Drop-if-busy flushes**: a full work queue skips that flush
//! - **No core retry**: a failed batch is reported and discarded
//!
//! # Example
//!
//! ```ignore
//! let dispatcher = Dispatcher::start(DispatcherConfig::default());
//! let output = RunningOutput::new(settings, Arc::new(StdoutOutput::new()), dispatcher.clone());
//! output.connect().await?;
//!
//! output.add(metric);
//!
//! dispatcher.shutdown(Duration::from_secs(5)).await?;
//! output.close().await?;
//! ```

mod buffer;
mod destination;
mod dispatcher;
mod error;
mod output;
mod running_output;
pub mod util;

pub use buffer::{AddOutcome, MetricBuffer};
pub use destination::{Destination, FlushSettings};
pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherMetricsHandle};
pub use error::{PipelineError, Result};
pub use output::Output;
pub use running_output::{OutputMetricsHandle, OutputSettings, RunningOutput};

pub use tally_routing::{DestinationKey, RoutingPolicy};
