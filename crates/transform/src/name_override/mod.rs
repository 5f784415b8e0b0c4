//! Override Processor - Rename measurements and set tags
//!
//! ```toml
//! [[processors.override]]
//! namepass = ["cpu"]
//! name_override = "host_cpu"
//! tags = { team = "infra" }
//! ```
//!
//! `name_override` wins over prefix and suffix. Tags replace existing values.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tally_config::{PluginKind, decode_options};
use tally_metric::Metric;

use crate::registry::ProcessorFactory;
use crate::{Processor, TransformError, TransformResult};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

/// Options of the `override` processor
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverrideConfig {
    pub name_override: Option<String>,
    pub name_prefix: Option<String>,
    pub name_suffix: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl OverrideConfig {
    pub fn validate(&self) -> TransformResult<()> {
        if self.name_override.as_deref() == Some("") {
            return Err(TransformError::config("name_override must not be empty"));
        }
        Ok(())
    }
}

/// Rewrites measurement names and sets tags
#[derive(Debug, Clone)]
pub struct OverrideProcessor {
    config: OverrideConfig,
}

impl OverrideProcessor {
    pub fn new(config: OverrideConfig) -> TransformResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn apply(&self, metric: &mut Metric) {
        if let Some(name) = &self.config.name_override {
            metric.set_name(name.as_str());
        } else {
            if let Some(prefix) = &self.config.name_prefix {
                metric.add_prefix(prefix);
            }
            if let Some(suffix) = &self.config.name_suffix {
                metric.add_suffix(suffix);
            }
        }
        for (key, value) in &self.config.tags {
            metric.set_tag(key.as_str(), value.as_str());
        }
    }
}

impl Processor for OverrideProcessor {
    fn process<'a>(
        &'a self,
        mut metric: Metric,
    ) -> Pin<Box<dyn Future<Output = TransformResult<Vec<Metric>>> + Send + 'a>> {
        Box::pin(async move {
            self.apply(&mut metric);
            Ok(vec![metric])
        })
    }

    fn name(&self) -> &'static str {
        "override"
    }
}

/// Factory for [`OverrideProcessor`]
pub struct OverrideFactory;

impl ProcessorFactory for OverrideFactory {
    fn create(&self, options: &toml::Table) -> TransformResult<Box<dyn Processor>> {
        let config: OverrideConfig = decode_options(PluginKind::Processor, self.name(), options)?;
        Ok(Box::new(OverrideProcessor::new(config)?))
    }

    fn name(&self) -> &'static str {
        "override"
    }
}
