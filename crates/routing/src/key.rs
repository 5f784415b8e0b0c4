//! Destination keys

use std::fmt;

/// Identity of a destination: plugin id, instance id, optional sub-group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationKey {
    pub plugin: String,
    pub instance: String,
    pub group: Option<String>,
}

impl DestinationKey {
    pub fn new(
        plugin: impl Into<String>,
        instance: impl Into<String>,
        group: Option<String>,
    ) -> Self {
        Self {
            plugin: plugin.into(),
            instance: instance.into(),
            group,
        }
    }

    /// Catch-all destination
    pub fn default_key() -> Self {
        Self::new("default", "", None)
    }

    /// Destination for the agent's own telemetry
    pub fn agent() -> Self {
        Self::new("agent", "", None)
    }

    /// Destination for host-level system metrics
    pub fn host() -> Self {
        Self::new("host", "", None)
    }

    /// Default, agent or host destination
    pub fn is_well_known(&self) -> bool {
        self.instance.is_empty()
            && self.group.is_none()
            && matches!(self.plugin.as_str(), "default" | "agent" | "host")
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.plugin)?;
        if !self.instance.is_empty() {
            write!(f, "/{}", self.instance)?;
        }
        if let Some(group) = &self.group {
            write!(f, "/{group}")?;
        }
        Ok(())
    }
}
