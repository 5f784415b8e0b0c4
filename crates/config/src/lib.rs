//! Tally Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! A minimal config only needs one input and one output.
//!
//! # Parsing
//!
//! ```
//! use tally_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[[outputs.stdout]]").unwrap();
//! assert_eq!(config.output_blocks().len(), 1);
//! ```
//!
//! # Example
//!
//! ```toml
//! [agent]
//! interval = "10s"
//! flush_interval = "10s"
//!
//! [global_tags]
//! dc = "eu-west"
//!
//! [[inputs.constant]]
//! name = "heartbeat"
//! fields = { up = 1 }
//!
//! [[outputs.stdout]]
//! ```
//!
//! # Errors
//!
//! Unreadable files, malformed TOML and unusable `[agent]` values fail
//! loading. A broken plugin block only disables that plugin: the
//! `*_blocks()` accessors return one `Result` per block.

mod agent;
mod error;
mod logging;
mod metrics;
mod plugins;
mod validation;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use agent::{AgentConfig, RoutingMode};
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use metrics::{MetricsConfig, MetricsFormat};
pub use plugins::{
    AggregatorConfig, InputConfig, OutputConfig, PluginBlock, PluginKind, PluginSettings,
    ProcessorConfig, decode_options, decode_section,
};

/// Decoded blocks of one section; one entry per block, in file order
pub type Blocks<T> = Vec<Result<PluginBlock<T>>>;

/// Main configuration structure
///
/// All sections are optional with sensible defaults. Plugin sections stay
/// raw until requested so that each block can fail on its own.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent-wide defaults
    pub agent: AgentConfig,

    /// Tags added to every metric
    pub global_tags: BTreeMap<String, String>,

    /// Logging configuration
    pub log: LogConfig,

    /// Self-metrics reporting
    pub metrics: MetricsConfig,

    /// `[[inputs.*]]` blocks
    pub inputs: toml::Table,

    /// `[[outputs.*]]` blocks
    pub outputs: toml::Table,

    /// `[[processors.*]]` blocks
    pub processors: toml::Table,

    /// `[[aggregators.*]]` blocks
    pub aggregators: toml::Table,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or has
    /// unusable agent settings.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    pub fn input_blocks(&self) -> Blocks<InputConfig> {
        decode_section(&self.inputs, &self.agent)
    }

    pub fn output_blocks(&self) -> Blocks<OutputConfig> {
        decode_section(&self.outputs, &self.agent)
    }

    pub fn processor_blocks(&self) -> Blocks<ProcessorConfig> {
        decode_section(&self.processors, &self.agent)
    }

    pub fn aggregator_blocks(&self) -> Blocks<AggregatorConfig> {
        decode_section(&self.aggregators, &self.agent)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
