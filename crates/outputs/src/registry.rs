//! Output Registry
//!
//! Maps plugin names to factories. A factory returns a shared sink; the
//! same value serves every destination of its configured instance.

use std::collections::HashMap;
use std::sync::Arc;

use tally_config::{PluginKind, decode_options};

use crate::discard::DiscardOutput;
use crate::file::{FileConfig, FileOutput};
use crate::stdout::{StdoutConfig, StdoutOutput};
use crate::{Output, OutputError, Result};

/// Creates outputs from their plugin-specific options
pub trait OutputFactory: Send + Sync {
    /// # Errors
    ///
    /// `OutputError::Options` or `OutputError::Config` when the options
    /// are invalid.
    fn create(&self, options: &toml::Table) -> Result<Arc<dyn Output>>;

    fn name(&self) -> &'static str;
}

/// Registry of output factories
pub struct OutputRegistry {
    factories: HashMap<String, Box<dyn OutputFactory>>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in output
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtin_outputs(&mut registry);
        registry
    }

    /// Register a factory
    ///
    /// # Panics
    ///
    /// Panics if a factory is already registered under `type_name`.
    pub fn register<F: OutputFactory + 'static>(&mut self, type_name: &str, factory: F) {
        if !self.try_register(type_name, factory) {
            panic!("output factory '{}' already registered", type_name);
        }
    }

    /// Register a factory; `false` if the name is taken
    pub fn try_register<F: OutputFactory + 'static>(&mut self, type_name: &str, factory: F) -> bool {
        if self.factories.contains_key(type_name) {
            return false;
        }
        self.factories
            .insert(type_name.to_string(), Box::new(factory));
        true
    }

    /// Create an output by plugin name
    pub fn create(&self, type_name: &str, options: &toml::Table) -> Result<Arc<dyn Output>> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| OutputError::UnknownPlugin {
                name: type_name.to_string(),
                available: self.available_types().join(", "),
            })?;
        factory.create(options)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered plugin names, sorted
    pub fn available_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for OutputRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Built-in factories
// ============================================================================

/// Factory for the `discard` output
pub struct DiscardFactory;

impl OutputFactory for DiscardFactory {
    fn create(&self, options: &toml::Table) -> Result<Arc<dyn Output>> {
        if let Some(key) = options.keys().next() {
            return Err(OutputError::config("discard", format!("unknown option '{key}'")));
        }
        Ok(Arc::new(DiscardOutput::new()))
    }

    fn name(&self) -> &'static str {
        "discard"
    }
}

/// Factory for the `stdout` output
pub struct StdoutFactory;

impl OutputFactory for StdoutFactory {
    fn create(&self, options: &toml::Table) -> Result<Arc<dyn Output>> {
        let config: StdoutConfig = decode_options(PluginKind::Output, "stdout", options)?;
        Ok(Arc::new(StdoutOutput::new(config)))
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

/// Factory for the `file` output
pub struct FileFactory;

impl OutputFactory for FileFactory {
    fn create(&self, options: &toml::Table) -> Result<Arc<dyn Output>> {
        let config: FileConfig = decode_options(PluginKind::Output, "file", options)?;
        Ok(Arc::new(FileOutput::new(config)?))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Register `discard`, `file` and `stdout`
pub fn register_builtin_outputs(registry: &mut OutputRegistry) {
    registry.register("discard", DiscardFactory);
    registry.register("file", FileFactory);
    registry.register("stdout", StdoutFactory);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(toml: &str) -> toml::Table {
        toml.parse().unwrap()
    }

    #[test]
    fn test_builtin_outputs() {
        let registry = OutputRegistry::with_builtins();
        assert_eq!(registry.available_types(), vec!["discard", "file", "stdout"]);
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("stdout"));
    }

    #[test]
    fn test_create() {
        let registry = OutputRegistry::with_builtins();
        assert!(registry.create("discard", &options("")).is_ok());
        assert!(registry.create("stdout", &options("destination_comments = true")).is_ok());
        assert!(registry.create("file", &options(r#"path = "/tmp/out.lp""#)).is_ok());
    }

    #[test]
    fn test_create_errors() {
        let registry = OutputRegistry::with_builtins();

        let err = registry.create("kafka", &options("")).err().unwrap();
        assert_eq!(
            err.to_string(),
            "unknown output 'kafka', available: [discard, file, stdout]"
        );

        let err = registry.create("file", &options("")).err().unwrap();
        assert!(matches!(err, OutputError::Options(_)));

        let err = registry.create("discard", &options("x = 1")).err().unwrap();
        assert!(err.to_string().contains("unknown option 'x'"));
    }

    #[test]
    fn test_try_register_duplicate() {
        let mut registry = OutputRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.try_register("discard", DiscardFactory));
        assert!(!registry.try_register("discard", DiscardFactory));
    }
}
