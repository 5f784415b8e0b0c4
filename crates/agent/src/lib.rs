//! Tally Agent - Wiring and lifecycle
//!
//! Turns a [`tally_config::Config`] into a running pipeline using the
//! factories of an explicit [`PluginRegistry`].
//!
//! # Example
//!
//! ```ignore
//! let config = Config::from_file("tally.toml")?;
//! let plugins = PluginRegistry::with_builtins();
//! let agent = Agent::new(&config, &plugins)?;
//!
//! let shutdown = CancellationToken::new();
//! agent.run(shutdown.clone()).await?;
//! ```

mod agent;
mod error;
mod ingest;
mod registry;

pub use agent::{Agent, PluginInfo, RunningAgent, instance_id, resolve_global_tags};
pub use error::{AgentError, Result, SkippedPlugin};
pub use registry::PluginRegistry;
