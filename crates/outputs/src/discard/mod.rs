//! Discard Output - Drops every batch
//!
//! Measures pipeline throughput without sink I/O, and gives a config a
//! valid output while inputs are being tried out.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tally_metric::Metric;
use tally_pipeline::{DestinationKey, Output};

/// Counts and discards batches
#[derive(Debug, Default)]
pub struct DiscardOutput {
    batches: AtomicU64,
    metrics: AtomicU64,
}

impl DiscardOutput {
    pub const fn new() -> Self {
        Self {
            batches: AtomicU64::new(0),
            metrics: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn metrics(&self) -> u64 {
        self.metrics.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Output for DiscardOutput {
    async fn write(&self, _destination: &DestinationKey, metrics: &[Metric]) -> anyhow::Result<()> {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.metrics.fetch_add(metrics.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_counts_batches() {
        let output = DiscardOutput::new();
        let batch = vec![
            Metric::new("cpu", Utc::now()).with_field("idle", 1.0),
            Metric::new("cpu", Utc::now()).with_field("idle", 2.0),
        ];
        output.write(&DestinationKey::default_key(), &batch).await.unwrap();
        output.write(&DestinationKey::agent(), &batch[..1]).await.unwrap();

        assert_eq!(output.batches(), 2);
        assert_eq!(output.metrics(), 3);
    }
}
