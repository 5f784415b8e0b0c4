//! Tally - Host telemetry agent
//!
//! # Usage
//!
//! ```bash
//! # Run the agent (default)
//! tally --config tally.toml
//!
//! # Validate a configuration and list what would run
//! tally check --config tally.toml
//!
//! # List built-in plugins
//! tally plugins
//! ```

mod cmd;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tally_config::{Config, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Configuration file used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "tally.toml";

/// Tally - Host telemetry agent
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the agent
    Run,

    /// Validate the configuration and list the plugins it builds
    Check,

    /// List registered plugins by kind
    Plugins,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    match cli.command {
        Some(Command::Check) => {
            // Check reports problems itself; only warnings and up are logged
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), LogFormat::Console)?;
            cmd::check::run(&config_path)
        }
        Some(Command::Plugins) => cmd::plugins::run(),
        Some(Command::Run) | None => {
            let (level, format) = resolve_logging(cli.log_level.as_deref(), &config_path);
            init_logging(&level, format)?;
            cmd::run::run(&config_path).await
        }
    }
}

/// Resolve log level and format: CLI flag > config file > default "info"
fn resolve_logging(cli_level: Option<&str>, config_path: &Path) -> (String, LogFormat) {
    let config = if config_path.exists() {
        Config::from_file(config_path).ok()
    } else {
        None
    };
    let format = config.as_ref().map(|c| c.log.format).unwrap_or_default();

    if let Some(level) = cli_level {
        return (level.to_string(), format);
    }
    match config {
        Some(config) => (config.log.level.directive().to_string(), format),
        None => ("info".to_string(), format),
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    match format {
        LogFormat::Console => tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init(),
    }

    Ok(())
}
