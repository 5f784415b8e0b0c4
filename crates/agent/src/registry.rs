//! Plugin Registry - Every factory the agent can build from
//!
//! One value per process, filled before the agent is constructed and
//! passed to it explicitly. There is no global registration.
//!
//! # Example
//!
//! ```ignore
//! let mut plugins = PluginRegistry::with_builtins();
//! plugins.inputs_mut().register("disk", DiskFactory);
//! let agent = Agent::new(config, &plugins)?;
//! ```

use tally_config::PluginKind;
use tally_inputs::InputRegistry;
use tally_outputs::OutputRegistry;
use tally_transform::{AggregatorRegistry, ProcessorRegistry};

/// Factories for the four plugin kinds
#[derive(Default)]
pub struct PluginRegistry {
    inputs: InputRegistry,
    outputs: OutputRegistry,
    processors: ProcessorRegistry,
    aggregators: AggregatorRegistry,
}

impl PluginRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in plugin
    pub fn with_builtins() -> Self {
        Self {
            inputs: InputRegistry::with_builtins(),
            outputs: OutputRegistry::with_builtins(),
            processors: ProcessorRegistry::with_builtins(),
            aggregators: AggregatorRegistry::with_builtins(),
        }
    }

    pub fn inputs(&self) -> &InputRegistry {
        &self.inputs
    }

    pub fn inputs_mut(&mut self) -> &mut InputRegistry {
        &mut self.inputs
    }

    pub fn outputs(&self) -> &OutputRegistry {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut OutputRegistry {
        &mut self.outputs
    }

    pub fn processors(&self) -> &ProcessorRegistry {
        &self.processors
    }

    pub fn processors_mut(&mut self) -> &mut ProcessorRegistry {
        &mut self.processors
    }

    pub fn aggregators(&self) -> &AggregatorRegistry {
        &self.aggregators
    }

    pub fn aggregators_mut(&mut self) -> &mut AggregatorRegistry {
        &mut self.aggregators
    }

    /// Registered names of one kind, sorted
    pub fn names(&self, kind: PluginKind) -> Vec<&str> {
        match kind {
            PluginKind::Input => self.inputs.available_types(),
            PluginKind::Output => self.outputs.available_types(),
            PluginKind::Processor => self.processors.available_types(),
            PluginKind::Aggregator => self.aggregators.available_types(),
        }
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("inputs", &self.inputs.available_types())
            .field("outputs", &self.outputs.available_types())
            .field("processors", &self.processors.available_types())
            .field("aggregators", &self.aggregators.available_types())
            .finish()
    }
}
