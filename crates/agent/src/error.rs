//! Agent error types

use tally_config::{ConfigError, PluginKind};
use tally_pipeline::PipelineError;
use thiserror::Error;

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that stop the agent as a whole
///
/// A single plugin failing to build is not one of them; it is logged,
/// recorded as a [`SkippedPlugin`] and the agent carries on.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration could not be used at all
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Every output failed to build or connect
    #[error("no usable outputs: {0} configured, none could be started")]
    NoOutputs(usize),

    /// Shutdown finished with an error
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// A plugin block left out of the running agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPlugin {
    pub kind: PluginKind,
    /// Why; names the block
    pub message: String,
}

impl SkippedPlugin {
    pub fn new(kind: PluginKind, message: impl ToString) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for SkippedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            AgentError::NoOutputs(2).to_string(),
            "no usable outputs: 2 configured, none could be started"
        );

        let err = AgentError::from(PipelineError::DrainTimeout { remaining: 3 });
        assert!(err.to_string().contains("3 metrics"));
    }

    #[test]
    fn test_skipped_display() {
        let skipped = SkippedPlugin::new(PluginKind::Input, "input 'file-0': no files configured");
        assert_eq!(skipped.kind, PluginKind::Input);
        assert_eq!(skipped.to_string(), "input 'file-0': no files configured");
    }
}
