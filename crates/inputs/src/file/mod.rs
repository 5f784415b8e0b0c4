//! File Input - Parse whole files every gather
//!
//! ```toml
//! [[inputs.file]]
//! files = ["/var/spool/metrics/*.lp"]
//! data_format = "influx"
//! file_tag = "source"
//! ```
//!
//! Each gather expands every pattern and parses every matching file from
//! the start. A file that cannot be read or parsed is reported and
//! skipped; the others are still collected.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tally_config::{PluginKind, decode_options};
use tally_metric::Parser;

use crate::registry::{InputContext, InputFactory};
use crate::{Accumulator, Input, InputError, InputKind, ParserInput, Result};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

/// Options of the `file` input
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Paths or glob patterns
    pub files: Vec<String>,
    /// Tag carrying the source file name
    #[serde(default)]
    pub file_tag: Option<String>,
}

/// Reads and parses files matching glob patterns
pub struct FileInput {
    patterns: Vec<String>,
    file_tag: Option<String>,
    parser: Option<Box<dyn Parser>>,
}

impl FileInput {
    /// # Errors
    ///
    /// `InputError::Config` when `files` is empty or holds a malformed
    /// pattern.
    pub fn new(config: FileConfig) -> Result<Self> {
        if config.files.is_empty() {
            return Err(InputError::config("file", "files must not be empty"));
        }
        for pattern in &config.files {
            glob::Pattern::new(pattern).map_err(|e| {
                InputError::config("file", format!("invalid pattern '{pattern}': {}", e.msg))
            })?;
        }
        Ok(Self {
            patterns: config.files,
            file_tag: config.file_tag,
            parser: None,
        })
    }

    async fn read_file(&self, parser: &dyn Parser, path: &Path, acc: &dyn Accumulator) -> anyhow::Result<()> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
        let metrics = parser
            .parse(&content)
            .map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?;

        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        for mut metric in metrics {
            if let (Some(tag), Some(source)) = (&self.file_tag, &source) {
                metric.set_tag(tag.as_str(), source.as_str());
            }
            acc.add_metric(metric);
        }
        Ok(())
    }
}

#[async_trait]
impl Input for FileInput {
    fn init(&mut self) -> anyhow::Result<()> {
        if self.parser.is_none() {
            anyhow::bail!("no parser configured");
        }
        Ok(())
    }

    async fn gather(&self, acc: &dyn Accumulator) -> anyhow::Result<()> {
        let Some(parser) = self.parser.as_deref() else {
            anyhow::bail!("no parser configured");
        };

        for pattern in &self.patterns {
            let paths: Vec<_> = glob::glob(pattern)?.collect();
            for entry in paths {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        acc.add_error(anyhow::anyhow!("{pattern}: {e}"));
                        continue;
                    }
                };
                if let Err(e) = self.read_file(parser, &path, acc).await {
                    acc.add_error(e);
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

impl std::fmt::Debug for FileInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileInput")
            .field("patterns", &self.patterns)
            .field("file_tag", &self.file_tag)
            .field("parser", &self.parser.as_ref().map(|p| p.name()))
            .finish()
    }
}

impl ParserInput for FileInput {
    fn set_parser(&mut self, parser: Box<dyn Parser>) {
        self.parser = Some(parser);
    }
}

/// Factory for the `file` input
pub struct FileFactory;

impl InputFactory for FileFactory {
    fn create(&self, options: &toml::Table, _context: &InputContext) -> Result<InputKind> {
        let config: FileConfig = decode_options(PluginKind::Input, "file", options)?;
        Ok(InputKind::Parser(Box::new(FileInput::new(config)?)))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
