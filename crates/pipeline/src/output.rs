//! Output capability contract

use async_trait::async_trait;
use tally_metric::Metric;
use tally_routing::DestinationKey;

/// A sink that receives batched metrics
///
/// Batching, buffering and flush timing are applied by the pipeline. One
/// `Output` value serves every destination of its configured instance, and
/// writes for different destinations may run concurrently, so
/// implementations synchronize internally.
#[async_trait]
pub trait Output: Send + Sync {
    /// Called once before any destination is flushed
    async fn connect(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Set up resources for a destination before its first write
    ///
    /// Runs on a flush worker, never on the routing path. A failure is
    /// retried on the next flush; buffered metrics are kept meanwhile.
    async fn provision(&self, _destination: &DestinationKey) -> anyhow::Result<()> {
        Ok(())
    }

    /// Write one batch; metrics are in buffer order
    async fn write(&self, destination: &DestinationKey, metrics: &[Metric]) -> anyhow::Result<()>;

    /// Release resources at shutdown
    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
