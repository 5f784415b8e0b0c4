//! Rename Processor - Rename fields, tags and measurements
//!
//! ```toml
//! [[processors.rename]]
//!   [[processors.rename.replace]]
//!   field = "idle"
//!   dest = "idle_pct"
//!
//!   [[processors.rename.replace]]
//!   tag = "host"
//!   dest = "hostname"
//! ```
//!
//! Replacements apply in order. Renaming onto an existing key replaces it.

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

/// One rename rule; exactly one of `measurement`, `tag`, `field` is set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Replacement {
    pub measurement: Option<String>,
    pub tag: Option<String>,
    pub field: Option<String>,
    pub dest: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Measurement(String),
    Tag(String),
    Field(String),
}

impl Replacement {
    fn target(&self, position: usize) -> TransformResult<Target> {
        let targets = [
            self.measurement.clone().map(Target::Measurement),
            self.tag.clone().map(Target::Tag),
            self.field.clone().map(Target::Field),
        ];
        let mut set = targets.into_iter().flatten();
        match (set.next(), set.next()) {
            (Some(target), None) => Ok(target),
            _ => Err(TransformError::config(format!(
                "replace #{position}: set exactly one of measurement, tag or field"
            ))),
        }
    }
}

/// Options of the `rename` processor
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenameConfig {
    pub replace: Vec<Replacement>,
}

/// Applies rename rules in order
#[derive(Debug, Clone)]
pub struct RenameProcessor {
    rules: Vec<(Target, String)>,
}

impl RenameProcessor {
    pub fn new(config: RenameConfig) -> TransformResult<Self> {
        let rules = config
            .replace
            .iter()
            .enumerate()
            .map(|(i, r)| {
                if r.dest.is_empty() {
                    return Err(TransformError::config(format!("replace #{i}: dest is empty")));
                }
                Ok((r.target(i)?, r.dest.clone()))
            })
            .collect::<TransformResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    fn apply(&self, metric: &mut Metric) {
        for (target, dest) in &self.rules {
            match target {
                Target::Measurement(name) => {
                    if metric.name() == name.as_str() {
                        metric.set_name(dest.as_str());
                    }
                }
                Target::Tag(key) => {
                    if let Some(value) = metric.remove_tag(key) {
                        metric.set_tag(dest.as_str(), value);
                    }
                }
                Target::Field(key) => {
                    metric.rename_field(key, dest);
                }
            }
        }
    }
}

impl Processor for RenameProcessor {
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
        "rename"
    }
}

/// Factory for [`RenameProcessor`]
pub struct RenameFactory;

impl ProcessorFactory for RenameFactory {
    fn create(&self, options: &toml::Table) -> TransformResult<Box<dyn Processor>> {
        let config: RenameConfig = decode_options(PluginKind::Processor, self.name(), options)?;
        Ok(Box::new(RenameProcessor::new(config)?))
    }

    fn name(&self) -> &'static str {
        "rename"
    }
}
