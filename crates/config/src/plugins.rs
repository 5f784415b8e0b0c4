//! Plugin blocks
//!
//! Plugins are declared as arrays of tables keyed by plugin name:
//!
//! ```toml
//! [[inputs.cpu]]
//! interval = "5s"
//!
//! [[inputs.cpu]]
//! alias = "cpu_fast"
//! interval = "1s"
//!
//! [[outputs.stdout]]
//! metric_batch_size = 100
//! ```
//!
//! Each block is decoded on its own. Keys common to every plugin of a kind
//! are typed; everything else is kept in `options` for the plugin factory.
//! A block that fails to decode or validate produces an error for that block
//! only, and the first error wins.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tally_filter::{Filter, FilterRules};

use crate::{AgentConfig, ConfigError, Result};

/// Plugin kinds, as named in the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Input,
    Output,
    Processor,
    Aggregator,
}

impl PluginKind {
    /// Singular name used in messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Processor => "processor",
            Self::Aggregator => "aggregator",
        }
    }

    /// Section name in the configuration file
    pub fn section(&self) -> &'static str {
        match self {
            Self::Input => "inputs",
            Self::Output => "outputs",
            Self::Processor => "processors",
            Self::Aggregator => "aggregators",
        }
    }
}

/// One decoded plugin block
#[derive(Debug, Clone)]
pub struct PluginBlock<T> {
    /// Plugin name (the key under the section)
    pub name: String,
    /// Position among blocks of the same plugin name
    pub index: usize,
    /// Position among all blocks of the section, in file order
    pub ordinal: usize,
    /// Decoded settings
    pub config: T,
}

/// Settings shared by all blocks of one kind
pub trait PluginSettings: DeserializeOwned {
    const KIND: PluginKind;

    /// Filter rules embedded in the block
    fn filter_rules(&self) -> &FilterRules;

    /// Checks beyond decoding; first failure is returned
    fn validate(&self, _name: &str, _agent: &AgentConfig) -> Result<()> {
        Ok(())
    }
}

/// Decode all blocks of a section, in file order
///
/// A section value may be an array of tables (`[[inputs.cpu]]`) or a single
/// table (`[inputs.cpu]`). Each entry is `Ok` or the first error of that block.
pub fn decode_section<T: PluginSettings>(
    section: &toml::Table,
    agent: &AgentConfig,
) -> Vec<std::result::Result<PluginBlock<T>, ConfigError>> {
    let component = T::KIND.as_str();
    let mut blocks = Vec::new();
    let mut ordinal = 0;

    for (name, value) in section {
        let tables: Vec<&toml::Value> = match value {
            toml::Value::Array(items) => items.iter().collect(),
            table @ toml::Value::Table(_) => vec![table],
            other => {
                blocks.push(Err(ConfigError::invalid_block(
                    component,
                    name,
                    0,
                    format!("expected a table, found {}", other.type_str()),
                )));
                ordinal += 1;
                continue;
            }
        };

        for (index, table) in tables.into_iter().enumerate() {
            let block = decode_block::<T>(name, index, table, agent).map(|config| PluginBlock {
                name: name.clone(),
                index,
                ordinal,
                config,
            });
            blocks.push(block);
            ordinal += 1;
        }
    }

    blocks
}

fn decode_block<T: PluginSettings>(
    name: &str,
    index: usize,
    value: &toml::Value,
    agent: &AgentConfig,
) -> Result<T> {
    let component = T::KIND.as_str();
    let config: T = value
        .clone()
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::invalid_block(component, name, index, e.message()))?;

    Filter::compile(config.filter_rules())
        .map_err(|e| ConfigError::invalid_filter(component, name, e))?;
    config.validate(name, agent)?;
    Ok(config)
}

/// Decode plugin-specific options into a typed struct
pub fn decode_options<T: DeserializeOwned>(
    kind: PluginKind,
    name: &str,
    options: &toml::Table,
) -> Result<T> {
    toml::Value::Table(options.clone())
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::invalid_block(kind.as_str(), name, 0, e.message()))
}

fn check_positive(
    component: &'static str,
    name: &str,
    field: &'static str,
    value: Option<Duration>,
) -> Result<()> {
    match value {
        Some(d) if d.is_zero() => Err(ConfigError::invalid_value(
            component,
            name,
            field,
            "must be greater than zero",
        )),
        _ => Ok(()),
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// `[[inputs.<name>]]` block
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Instance id; generated when absent
    pub alias: Option<String>,

    /// Collection interval override
    #[serde(with = "humantime_serde")]
    pub interval: Option<Duration>,

    /// Timestamp precision override
    #[serde(with = "humantime_serde")]
    pub precision: Option<Duration>,

    /// Collection jitter override
    #[serde(with = "humantime_serde")]
    pub collection_jitter: Option<Duration>,

    /// Replace the measurement name
    pub name_override: Option<String>,

    /// Prepend to the measurement name
    pub name_prefix: Option<String>,

    /// Append to the measurement name
    pub name_suffix: Option<String>,

    /// Tags added to every metric from this input
    pub tags: BTreeMap<String, String>,

    /// Parser for inputs that read raw data
    pub data_format: Option<String>,

    #[serde(flatten)]
    pub filter: FilterRules,

    /// Plugin-specific settings
    #[serde(flatten)]
    pub options: toml::Table,
}

impl PluginSettings for InputConfig {
    const KIND: PluginKind = PluginKind::Input;

    fn filter_rules(&self) -> &FilterRules {
        &self.filter
    }

    fn validate(&self, name: &str, _agent: &AgentConfig) -> Result<()> {
        check_positive("input", name, "interval", self.interval)
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// `[[outputs.<name>]]` block
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Instance id; generated when absent
    pub alias: Option<String>,

    /// Flush interval override
    #[serde(with = "humantime_serde")]
    pub flush_interval: Option<Duration>,

    /// Flush jitter override
    #[serde(with = "humantime_serde")]
    pub flush_jitter: Option<Duration>,

    /// Batch size override
    pub metric_batch_size: Option<usize>,

    /// Buffer capacity override
    pub metric_buffer_limit: Option<usize>,

    /// Cap on destinations; metrics past it go to the default destination
    pub max_destinations: Option<usize>,

    #[serde(flatten)]
    pub filter: FilterRules,

    /// Plugin-specific settings
    #[serde(flatten)]
    pub options: toml::Table,
}

impl OutputConfig {
    pub fn batch_size(&self, agent: &AgentConfig) -> usize {
        self.metric_batch_size.unwrap_or(agent.metric_batch_size)
    }

    pub fn buffer_limit(&self, agent: &AgentConfig) -> usize {
        self.metric_buffer_limit.unwrap_or(agent.metric_buffer_limit)
    }

    pub fn flush_interval(&self, agent: &AgentConfig) -> Duration {
        self.flush_interval.unwrap_or(agent.flush_interval)
    }

    pub fn flush_jitter(&self, agent: &AgentConfig) -> Duration {
        self.flush_jitter.unwrap_or(agent.flush_jitter)
    }
}

impl PluginSettings for OutputConfig {
    const KIND: PluginKind = PluginKind::Output;

    fn filter_rules(&self) -> &FilterRules {
        &self.filter
    }

    fn validate(&self, name: &str, agent: &AgentConfig) -> Result<()> {
        check_positive("output", name, "flush_interval", self.flush_interval)?;
        let batch = self.batch_size(agent);
        if batch == 0 {
            return Err(ConfigError::invalid_value(
                "output",
                name,
                "metric_batch_size",
                "must be greater than zero",
            ));
        }
        if self.max_destinations == Some(0) {
            return Err(ConfigError::invalid_value(
                "output",
                name,
                "max_destinations",
                "must be greater than zero",
            ));
        }
        let limit = self.buffer_limit(agent);
        if limit < batch.saturating_mul(2) {
            return Err(ConfigError::invalid_value(
                "output",
                name,
                "metric_buffer_limit",
                format!("{limit} must be at least twice metric_batch_size ({batch})"),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Processors
// ============================================================================

/// `[[processors.<name>]]` block
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub alias: Option<String>,

    /// Position in the chain; ties keep file order
    pub order: i64,

    #[serde(flatten)]
    pub filter: FilterRules,

    #[serde(flatten)]
    pub options: toml::Table,
}

impl PluginSettings for ProcessorConfig {
    const KIND: PluginKind = PluginKind::Processor;

    fn filter_rules(&self) -> &FilterRules {
        &self.filter
    }
}

// ============================================================================
// Aggregators
// ============================================================================

/// `[[aggregators.<name>]]` block
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub alias: Option<String>,

    /// Window length
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub period: Duration,

    /// Wait after the window end before pushing
    /// Default: 100ms
    #[serde(with = "humantime_serde")]
    pub delay: Duration,

    /// Accept metrics this far before the window start
    /// Default: 0s
    #[serde(with = "humantime_serde")]
    pub grace: Duration,

    /// Do not forward metrics this aggregator consumes
    /// Default: false
    pub drop_original: bool,

    #[serde(flatten)]
    pub filter: FilterRules,

    #[serde(flatten)]
    pub options: toml::Table,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            alias: None,
            period: Duration::from_secs(30),
            delay: Duration::from_millis(100),
            grace: Duration::ZERO,
            drop_original: false,
            filter: FilterRules::default(),
            options: toml::Table::new(),
        }
    }
}

impl PluginSettings for AggregatorConfig {
    const KIND: PluginKind = PluginKind::Aggregator;

    fn filter_rules(&self) -> &FilterRules {
        &self.filter
    }

    fn validate(&self, name: &str, _agent: &AgentConfig) -> Result<()> {
        check_positive("aggregator", name, "period", Some(self.period))
    }
}

#[cfg(test)]
#[path = "plugins_test.rs"]
mod tests;
