//! Routing policy

use std::collections::HashSet;

use tally_config::RoutingMode;
use tally_metric::Metric;

use crate::DestinationKey;

/// Plugins whose metrics describe the agent itself
pub const AGENT_PLUGINS: &[&str] = &["internal"];

/// Plugins whose metrics describe the host
pub const HOST_PLUGINS: &[&str] = &[
    "cpu", "mem", "disk", "diskio", "net", "system", "swap", "processes", "kernel",
];

/// Maps a metric to its destination key
///
/// Resolution order:
/// 1. single mode: the default destination
/// 2. unknown origin: the default destination
/// 3. agent plugins: the agent destination; host plugins: the host destination
/// 4. otherwise (origin, instance, value of the routing tag if configured)
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    mode: RoutingMode,
    routing_tag: Option<String>,
    agent_plugins: HashSet<String>,
    host_plugins: HashSet<String>,
}

impl RoutingPolicy {
    pub fn new(mode: RoutingMode, routing_tag: Option<String>) -> Self {
        Self {
            mode,
            routing_tag,
            agent_plugins: AGENT_PLUGINS.iter().map(|s| s.to_string()).collect(),
            host_plugins: HOST_PLUGINS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Policy that sends everything to the default destination
    pub fn single() -> Self {
        Self::new(RoutingMode::Single, None)
    }

    #[inline]
    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    /// Resolve the destination key for a metric
    pub fn resolve(&self, metric: &Metric) -> DestinationKey {
        if self.mode == RoutingMode::Single {
            return DestinationKey::default_key();
        }

        let origin = metric.origin();
        if origin.is_unknown() {
            return DestinationKey::default_key();
        }
        if self.agent_plugins.contains(&origin.plugin) {
            return DestinationKey::agent();
        }
        if self.host_plugins.contains(&origin.plugin) {
            return DestinationKey::host();
        }

        let group = self
            .routing_tag
            .as_deref()
            .and_then(|tag| metric.tag(tag))
            .map(str::to_string);

        DestinationKey::new(origin.plugin.as_str(), origin.instance.as_str(), group)
    }
}
