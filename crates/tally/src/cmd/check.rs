//! Check command - Validate a configuration without running it

use std::path::Path;

use anyhow::{Context, Result, bail};
use tally_agent::{Agent, PluginRegistry};
use tally_config::Config;

/// Build every plugin the configuration declares and report the result
///
/// Fails when the file is unusable or any plugin block was left out.
pub fn run(config_path: &Path) -> Result<()> {
    let config = Config::from_file(config_path).context("failed to load configuration")?;
    let plugins = PluginRegistry::with_builtins();
    let agent = Agent::new(&config, &plugins).context("configuration cannot run")?;

    print!("{}", render(&agent));
    let skipped = agent.skipped().len();
    if skipped > 0 {
        bail!("{skipped} plugin block(s) failed validation");
    }
    Ok(())
}

/// Built plugins in pipeline order, then the blocks that failed
pub fn render(agent: &Agent) -> String {
    let mut out = String::new();
    for plugin in agent.plugins() {
        out.push_str(&format!(
            "{:<10} {} ({})\n",
            plugin.kind.as_str(),
            plugin.id,
            plugin.plugin
        ));
    }
    for skipped in agent.skipped() {
        out.push_str(&format!("{:<10} FAILED: {}\n", skipped.kind.as_str(), skipped));
    }
    out
}
