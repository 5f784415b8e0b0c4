//! Run command - Start the agent and stop it on a signal

use std::path::Path;

use anyhow::{Context, Result};
use tally_agent::{Agent, PluginRegistry};
use tally_config::Config;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Run the agent until Ctrl+C or SIGTERM
pub async fn run(config_path: &Path) -> Result<()> {
    let config = Config::from_file(config_path).context("failed to load configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "starting tally"
    );

    let plugins = PluginRegistry::with_builtins();
    let agent = Agent::new(&config, &plugins).context("failed to build agent")?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        info!("shutdown signal received, stopping agent...");
        trigger.cancel();
    });

    agent.run(shutdown).await.context("agent stopped with an error")?;
    info!("tally stopped");
    Ok(())
}

/// Wait for Ctrl+C, or SIGTERM on unix
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
