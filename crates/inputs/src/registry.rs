//! Input Registry
//!
//! Maps plugin names to factories. Each factory resolves its plugin into
//! one [`InputKind`] variant, so the rest of the agent never asks a plugin
//! what it can do.
//!
//! # Example
//!
//! ```ignore
//! let registry = InputRegistry::with_builtins();
//! let context = InputContext::new(hub).with_data_format(config.data_format.clone());
//! let kind = registry.create("file", &config.options, &context)?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tally_metric::parser_for;
use tally_metrics::MetricsHub;

use crate::{InputError, InputKind, Result};

/// Default parser for inputs without a `data_format`
pub const DEFAULT_DATA_FORMAT: &str = "influx";

/// What a factory may need besides its options
#[derive(Debug, Clone)]
pub struct InputContext {
    /// Self-telemetry, read by the `internal` input
    pub hub: Arc<MetricsHub>,
    /// Parser for parser inputs
    pub data_format: Option<String>,
}

impl InputContext {
    pub fn new(hub: Arc<MetricsHub>) -> Self {
        Self {
            hub,
            data_format: None,
        }
    }

    pub fn with_data_format(mut self, data_format: Option<String>) -> Self {
        self.data_format = data_format;
        self
    }
}

/// Creates inputs from their plugin-specific options
pub trait InputFactory: Send + Sync {
    /// Create an input instance
    ///
    /// # Errors
    ///
    /// `InputError::Options` or `InputError::Config` when the options are
    /// invalid.
    fn create(&self, options: &toml::Table, context: &InputContext) -> Result<InputKind>;

    fn name(&self) -> &'static str;
}

/// Registry of input factories
pub struct InputRegistry {
    factories: HashMap<String, Box<dyn InputFactory>>,
}

impl InputRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in input
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtin_inputs(&mut registry);
        registry
    }

    /// Register a factory
    ///
    /// # Panics
    ///
    /// Panics if a factory is already registered under `type_name`.
    pub fn register<F: InputFactory + 'static>(&mut self, type_name: &str, factory: F) {
        if !self.try_register(type_name, factory) {
            panic!("input factory '{}' already registered", type_name);
        }
    }

    /// Register a factory; `false` if the name is taken
    pub fn try_register<F: InputFactory + 'static>(&mut self, type_name: &str, factory: F) -> bool {
        if self.factories.contains_key(type_name) {
            return false;
        }
        self.factories
            .insert(type_name.to_string(), Box::new(factory));
        true
    }

    /// Create an input by plugin name and attach its parser
    ///
    /// # Errors
    ///
    /// - `InputError::UnknownPlugin` if the name is not registered
    /// - `InputError::Parser` for an unknown `data_format`
    /// - `InputError::Config` when `data_format` is set on an input that
    ///   does not parse
    /// - the factory's own error
    pub fn create(
        &self,
        type_name: &str,
        options: &toml::Table,
        context: &InputContext,
    ) -> Result<InputKind> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| InputError::UnknownPlugin {
                name: type_name.to_string(),
                available: self.available_types().join(", "),
            })?;

        match factory.create(options, context)? {
            InputKind::Parser(mut input) => {
                let format = context.data_format.as_deref().unwrap_or(DEFAULT_DATA_FORMAT);
                input.set_parser(parser_for(format)?);
                Ok(InputKind::Parser(input))
            }
            _ if context.data_format.is_some() => Err(InputError::config(
                type_name,
                "data_format is only supported by parser inputs",
            )),
            kind => Ok(kind),
        }
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

impl Default for InputRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Register `constant`, `file`, `internal` and `udp_listener`
pub fn register_builtin_inputs(registry: &mut InputRegistry) {
    registry.register("constant", crate::constant::ConstantFactory);
    registry.register("file", crate::file::FileFactory);
    registry.register("internal", crate::internal::InternalFactory);
    registry.register("udp_listener", crate::udp_listener::UdpListenerFactory);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> InputContext {
        InputContext::new(Arc::new(MetricsHub::new()))
    }

    fn create(registry: &InputRegistry, name: &str, options: &str, context: &InputContext) -> Result<InputKind> {
        let options: toml::Table = options.parse().unwrap();
        registry.create(name, &options, context)
    }

    #[test]
    fn test_builtin_inputs() {
        let registry = InputRegistry::with_builtins();
        assert_eq!(
            registry.available_types(),
            vec!["constant", "file", "internal", "udp_listener"]
        );
        assert!(registry.contains("file"));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_variants_resolved_at_creation() {
        let registry = InputRegistry::with_builtins();
        let ctx = context();

        let kind = create(&registry, "internal", "", &ctx).unwrap();
        assert!(matches!(kind, InputKind::Polled(_)));

        let kind = create(&registry, "file", r#"files = ["/tmp/none.lp"]"#, &ctx).unwrap();
        assert!(matches!(kind, InputKind::Parser(_)));

        let kind = create(&registry, "udp_listener", "", &ctx).unwrap();
        assert!(kind.is_service());
        assert_eq!(kind.name(), "udp_listener");
    }

    #[test]
    fn test_unknown_input() {
        let registry = InputRegistry::with_builtins();
        let err = create(&registry, "cpu", "", &context()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown input 'cpu', available: [constant, file, internal, udp_listener]"
        );
    }

    #[test]
    fn test_data_format_checks() {
        let registry = InputRegistry::with_builtins();

        let ctx = context().with_data_format(Some("csv".into()));
        let err = create(&registry, "file", r#"files = ["a.lp"]"#, &ctx).unwrap_err();
        assert!(matches!(err, InputError::Parser(_)));

        let ctx = context().with_data_format(Some("influx".into()));
        let err = create(&registry, "internal", "", &ctx).unwrap_err();
        assert!(matches!(err, InputError::Config { .. }));
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_register_duplicate_panics() {
        let mut registry = InputRegistry::with_builtins();
        registry.register("file", crate::file::FileFactory);
    }
}
