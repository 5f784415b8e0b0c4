//! Plugins command - List registered plugin names

use anyhow::Result;
use tally_agent::PluginRegistry;
use tally_config::PluginKind;

const KINDS: [PluginKind; 4] = [
    PluginKind::Input,
    PluginKind::Processor,
    PluginKind::Aggregator,
    PluginKind::Output,
];

pub fn run() -> Result<()> {
    print!("{}", render(&PluginRegistry::with_builtins()));
    Ok(())
}

/// One line per kind: `<section>: name, name, ...`
pub fn render(plugins: &PluginRegistry) -> String {
    let mut out = String::new();
    for kind in KINDS {
        out.push_str(kind.section());
        out.push_str(": ");
        out.push_str(&plugins.names(kind).join(", "));
        out.push('\n');
    }
    out
}
