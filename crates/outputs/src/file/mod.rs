//! File Output - Line protocol appended to files
//!
//! ```toml
//! [[outputs.file]]
//! path = "/var/lib/tally/metrics.lp"
//!
//! [[outputs.file]]
//! path = "/var/lib/tally/by-destination"
//! per_destination = true
//! ```
//!
//! With `per_destination`, `path` is a directory holding one
//! `<destination>.lp` file per destination, opened when the destination is
//! provisioned. Files are only ever appended to.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tally_metric::Metric;
use tally_pipeline::{DestinationKey, Output};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{OutputError, Result, encode_batch};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

/// Options of the `file` output
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub per_destination: bool,
}

type SharedFile = Arc<tokio::sync::Mutex<File>>;

/// Appends batches to one file or one file per destination
pub struct FileOutput {
    config: FileConfig,
    files: parking_lot::Mutex<HashMap<PathBuf, SharedFile>>,
}

impl FileOutput {
    /// # Errors
    ///
    /// `OutputError::Config` for an empty path.
    pub fn new(config: FileConfig) -> Result<Self> {
        if config.path.as_os_str().is_empty() {
            return Err(OutputError::config("file", "path must not be empty"));
        }
        Ok(Self {
            config,
            files: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    /// File that receives a destination's batches
    pub fn path_for(&self, destination: &DestinationKey) -> PathBuf {
        if !self.config.per_destination {
            return self.config.path.clone();
        }
        let name: String = destination
            .to_string()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
            .collect();
        self.config.path.join(format!("{name}.lp"))
    }

    async fn open(&self, path: &Path) -> std::io::Result<SharedFile> {
        let existing = self.files.lock().get(path).cloned();
        if let Some(file) = existing {
            return Ok(file);
        }
        let file = OpenOptions::new().create(true).append(true).open(path).await?;
        debug!(path = %path.display(), "output file opened");

        let mut files = self.files.lock();
        let file = files
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(file)));
        Ok(Arc::clone(file))
    }
}

#[async_trait]
impl Output for FileOutput {
    async fn connect(&self) -> anyhow::Result<()> {
        if self.config.per_destination {
            tokio::fs::create_dir_all(&self.config.path).await?;
        } else {
            self.open(&self.config.path).await?;
        }
        Ok(())
    }

    async fn provision(&self, destination: &DestinationKey) -> anyhow::Result<()> {
        self.open(&self.path_for(destination)).await?;
        Ok(())
    }

    async fn write(&self, destination: &DestinationKey, metrics: &[Metric]) -> anyhow::Result<()> {
        let path = self.path_for(destination);
        let file = self.open(&path).await?;
        let text = encode_batch(metrics);

        let mut file = file.lock().await;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        let files: Vec<SharedFile> = self.files.lock().drain().map(|(_, f)| f).collect();
        for file in files {
            let file = file.lock().await;
            file.sync_all().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for FileOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileOutput")
            .field("config", &self.config)
            .field("open_files", &self.files.lock().len())
            .finish()
    }
}
