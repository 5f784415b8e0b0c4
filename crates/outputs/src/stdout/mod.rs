//! Stdout Output - Line protocol on standard output
//!
//! ```toml
//! [[outputs.stdout]]
//! destination_comments = true
//! ```
//!
//! With `destination_comments`, each batch is preceded by a `# <destination>`
//! comment line, which line protocol parsers skip.

use async_trait::async_trait;
use serde::Deserialize;
use tally_metric::Metric;
use tally_pipeline::{DestinationKey, Output};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::encode_batch;

/// Options of the `stdout` output
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StdoutConfig {
    /// Prefix each batch with a comment naming its destination
    pub destination_comments: bool,
}

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Writes batches as line protocol
pub struct StdoutOutput {
    config: StdoutConfig,
    writer: Mutex<Writer>,
}

impl StdoutOutput {
    pub fn new(config: StdoutConfig) -> Self {
        Self::with_writer(config, Box::new(tokio::io::stdout()))
    }

    /// Write somewhere other than standard output
    pub fn with_writer(config: StdoutConfig, writer: Writer) -> Self {
        Self {
            config,
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl Output for StdoutOutput {
    async fn write(&self, destination: &DestinationKey, metrics: &[Metric]) -> anyhow::Result<()> {
        let mut text = String::new();
        if self.config.destination_comments {
            text.push_str(&format!("# {destination}\n"));
        }
        text.push_str(&encode_batch(metrics));

        // One lock per batch keeps batches from interleaving
        let mut writer = self.writer.lock().await;
        writer.write_all(text.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.writer.lock().await.flush().await?;
        Ok(())
    }
}

impl std::fmt::Debug for StdoutOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdoutOutput")
            .field("config", &self.config)
            .finish()
    }
}
