//! Unified metrics reporter
//!
//! Reads the [`MetricsHub`] at the configured interval and logs one report
//! per tick via tracing.

use std::sync::Arc;

use tally_config::{MetricsConfig, MetricsFormat};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{CollectedMetrics, HumanFormatter, JsonFormatter, MetricsFormatter, MetricsHub};

/// Builder for constructing a UnifiedReporter
#[derive(Default)]
pub struct UnifiedReporterBuilder {
    config: Option<MetricsConfig>,
    hub: Option<Arc<MetricsHub>>,
}

impl UnifiedReporterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the metrics configuration
    pub fn config(mut self, config: MetricsConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the hub to read from
    pub fn hub(mut self, hub: Arc<MetricsHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn build(self) -> UnifiedReporter {
        let config = self.config.unwrap_or_default();
        let formatter: Box<dyn MetricsFormatter> = match config.format {
            MetricsFormat::Human => Box::new(HumanFormatter::new()),
            MetricsFormat::Json => Box::new(JsonFormatter::new()),
        };

        UnifiedReporter {
            config,
            formatter,
            hub: self.hub.unwrap_or_default(),
            previous: None,
        }
    }
}

/// Periodic self-metrics reporter
pub struct UnifiedReporter {
    config: MetricsConfig,
    formatter: Box<dyn MetricsFormatter>,
    hub: Arc<MetricsHub>,
    previous: Option<CollectedMetrics>,
}

impl UnifiedReporter {
    pub fn builder() -> UnifiedReporterBuilder {
        UnifiedReporterBuilder::new()
    }

    /// Run the reporter until cancellation
    pub async fn run(mut self, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("metrics reporting disabled");
            return;
        }

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so the first report
        // covers a full interval.
        ticker.tick().await;

        info!(
            interval_secs = self.config.interval.as_secs(),
            format = ?self.config.format,
            "metrics reporter started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.report();
                }
            }
        }
    }

    /// Collect and log one report
    fn report(&mut self) {
        let output = self.render();
        for line in output.lines() {
            info!("{}", line);
        }
    }

    fn render(&mut self) -> String {
        let metrics = self.collect();
        let rates = self.previous.as_ref().and_then(|prev| metrics.rates(prev));
        let output = self.formatter.format(&metrics, rates.as_ref());
        self.previous = Some(metrics);
        output
    }

    fn collect(&self) -> CollectedMetrics {
        let mut metrics = self.hub.collect();
        if !self.config.include_inputs {
            metrics.inputs.clear();
        }
        if !self.config.include_outputs {
            metrics.outputs.clear();
        }
        metrics
    }
}
