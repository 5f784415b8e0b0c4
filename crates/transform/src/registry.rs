//! Processor and Aggregator Registries
//!
//! Registries map plugin names to factories so that configuration blocks
//! can be turned into plugin instances.
//!
//! # Design
//!
//! - **Explicit instances**: a registry is built once at startup and passed
//!   to whoever constructs the pipeline; there is no global registry
//! - **Fresh instances**: every `create` call returns a new plugin with its
//!   own state, which is how the two processor chains stay independent
//!
//! # Example
//!
//! ```ignore
//! let mut registry = ProcessorRegistry::new();
//! registry.register("noop", NoopFactory);
//!
//! let processor = registry.create("noop", &options)?;
//! ```

use std::collections::HashMap;

use crate::{Aggregator, Processor, TransformError, TransformResult};

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;

/// Creates processors from their plugin-specific options
pub trait ProcessorFactory: Send + Sync {
    /// Create a processor instance
    ///
    /// # Errors
    ///
    /// `TransformError::Options` or `TransformError::Config` when the
    /// options are invalid.
    fn create(&self, options: &toml::Table) -> TransformResult<Box<dyn Processor>>;

    /// Plugin name (for error messages)
    fn name(&self) -> &'static str;
}

/// Creates aggregators from their plugin-specific options
pub trait AggregatorFactory: Send + Sync {
    fn create(&self, options: &toml::Table) -> TransformResult<Box<dyn Aggregator>>;

    fn name(&self) -> &'static str;
}

// ============================================================================
// Processors
// ============================================================================

/// Registry of processor factories
pub struct ProcessorRegistry {
    factories: HashMap<String, Box<dyn ProcessorFactory>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in processor
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtin_processors(&mut registry);
        registry
    }

    /// Register a factory
    ///
    /// # Panics
    ///
    /// Panics if a factory is already registered under `type_name`.
    /// Use `try_register` for fallible registration.
    pub fn register<F: ProcessorFactory + 'static>(&mut self, type_name: &str, factory: F) {
        if !self.try_register(type_name, factory) {
            panic!("processor factory '{}' already registered", type_name);
        }
    }

    /// Register a factory; `false` if the name is taken
    pub fn try_register<F: ProcessorFactory + 'static>(
        &mut self,
        type_name: &str,
        factory: F,
    ) -> bool {
        if self.factories.contains_key(type_name) {
            return false;
        }
        self.factories
            .insert(type_name.to_string(), Box::new(factory));
        true
    }

    /// Create a processor by plugin name
    ///
    /// # Errors
    ///
    /// `TransformError::UnknownPlugin` if the name is not registered, or the
    /// factory's own error.
    pub fn create(
        &self,
        type_name: &str,
        options: &toml::Table,
    ) -> TransformResult<Box<dyn Processor>> {
        let factory = self.factories.get(type_name).ok_or_else(|| {
            TransformError::unknown("processor", type_name, &self.available_types())
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

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Register `noop`, `override` and `rename`
pub fn register_builtin_processors(registry: &mut ProcessorRegistry) {
    registry.register("noop", crate::noop::NoopFactory);
    registry.register("override", crate::name_override::OverrideFactory);
    registry.register("rename", crate::rename::RenameFactory);
}

// ============================================================================
// Aggregators
// ============================================================================

/// Registry of aggregator factories
pub struct AggregatorRegistry {
    factories: HashMap<String, Box<dyn AggregatorFactory>>,
}

impl AggregatorRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in aggregator
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtin_aggregators(&mut registry);
        registry
    }

    /// Register a factory
    ///
    /// # Panics
    ///
    /// Panics if a factory is already registered under `type_name`.
    pub fn register<F: AggregatorFactory + 'static>(&mut self, type_name: &str, factory: F) {
        if !self.try_register(type_name, factory) {
            panic!("aggregator factory '{}' already registered", type_name);
        }
    }

    pub fn try_register<F: AggregatorFactory + 'static>(
        &mut self,
        type_name: &str,
        factory: F,
    ) -> bool {
        if self.factories.contains_key(type_name) {
            return false;
        }
        self.factories
            .insert(type_name.to_string(), Box::new(factory));
        true
    }

    pub fn create(
        &self,
        type_name: &str,
        options: &toml::Table,
    ) -> TransformResult<Box<dyn Aggregator>> {
        let factory = self.factories.get(type_name).ok_or_else(|| {
            TransformError::unknown("aggregator", type_name, &self.available_types())
        })?;
        factory.create(options)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

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

impl Default for AggregatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Register `count` and `minmax`
pub fn register_builtin_aggregators(registry: &mut AggregatorRegistry) {
    registry.register("count", crate::count::CountFactory);
    registry.register("minmax", crate::minmax::MinMaxFactory);
}
