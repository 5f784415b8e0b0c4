//! Agent - Builds the pipeline from configuration and runs it
//!
//! # Lifecycle
//!
//! 1. [`Agent::new`] decodes every plugin block and builds its plugin. A
//!    block that fails is logged, recorded and left out.
//! 2. [`Agent::start`] connects outputs, then starts the flush dispatcher,
//!    the aggregators, the ingest task and finally the inputs.
//! 3. [`RunningAgent::shutdown`] stops producers before consumers:
//!    inputs, service inputs, aggregators, ingest (drained), the final
//!    aggregator push, the dispatcher drain, then outputs and processors
//!    are closed. Calling it again does nothing.

use std::sync::Arc;
use std::time::Duration;

use crossfire::{MAsyncRx, MAsyncTx};
use parking_lot::Mutex;
use sysinfo::System;
use tally_config::{
    AgentConfig, AggregatorConfig, Blocks, Config, InputConfig, MetricsConfig, OutputConfig,
    PluginBlock, PluginKind, ProcessorConfig,
};
use tally_filter::{Filter, FilterRules};
use tally_inputs::{InputContext, InputSettings, RunningInput, Tags};
use tally_metric::Metric;
use tally_metrics::{MetricsHub, UnifiedReporter};
use tally_pipeline::{
    Dispatcher, DispatcherConfig, FlushSettings, Output, OutputSettings, RoutingPolicy,
    RunningOutput,
};
use tally_transform::{
    AggregatorSettings, ProcessorChain, ProcessorSettings, RunningAggregator, RunningProcessor,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ingest::{self, Pipeline};
use crate::{AgentError, PluginRegistry, Result, SkippedPlugin};

#[cfg(test)]
#[path = "agent_test.rs"]
mod tests;

/// Id of a plugin instance: its alias, or `<plugin>-<index>`
pub fn instance_id(alias: Option<&str>, plugin: &str, index: usize) -> String {
    match alias {
        Some(alias) if !alias.is_empty() => alias.to_string(),
        _ => format!("{plugin}-{index}"),
    }
}

/// Global tags plus the `host` tag unless hostname tagging is off
///
/// A `host` entry in `[global_tags]` wins over the detected hostname.
pub fn resolve_global_tags(config: &Config) -> Tags {
    let mut tags: Tags = config.global_tags.clone();
    if !config.agent.omit_hostname {
        let host = if config.agent.hostname.is_empty() {
            System::host_name().unwrap_or_else(|| "localhost".to_string())
        } else {
            config.agent.hostname.clone()
        };
        tags.entry("host".to_string()).or_insert(host);
    }
    tags
}

/// One built plugin instance, for listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub kind: PluginKind,
    pub id: String,
    pub plugin: String,
}

struct PendingOutput {
    settings: OutputSettings,
    sink: Arc<dyn Output>,
}

/// A configured agent that has not started yet
pub struct Agent {
    agent: AgentConfig,
    metrics_config: MetricsConfig,
    hub: Arc<MetricsHub>,
    inputs: Vec<Arc<RunningInput>>,
    outputs: Vec<PendingOutput>,
    processors: ProcessorChain,
    aggregate_processors: ProcessorChain,
    aggregators: Vec<Arc<RunningAggregator>>,
    metrics_tx: MAsyncTx<Metric>,
    metrics_rx: MAsyncRx<Metric>,
    aggregated_tx: MAsyncTx<Metric>,
    aggregated_rx: MAsyncRx<Metric>,
    skipped: Vec<SkippedPlugin>,
}

impl Agent {
    /// Build every plugin the configuration declares
    ///
    /// # Errors
    ///
    /// `AgentError::NoOutputs` when no output block could be built. Any
    /// other plugin failure only removes that plugin.
    pub fn new(config: &Config, plugins: &PluginRegistry) -> Result<Self> {
        let agent = config.agent.clone();
        let hub = Arc::new(MetricsHub::new());
        let global_tags = Arc::new(resolve_global_tags(config));
        let (metrics_tx, metrics_rx) =
            crossfire::mpmc::bounded_async::<Metric>(agent.ingest_queue_size);
        let (aggregated_tx, aggregated_rx) =
            crossfire::mpmc::bounded_async::<Metric>(agent.ingest_queue_size);

        let mut builder = Builder {
            plugins,
            agent: &agent,
            hub: &hub,
            skipped: Vec::new(),
        };

        let output_blocks = config.output_blocks();
        let configured = output_blocks.len();
        let outputs = builder.outputs(output_blocks);
        if outputs.is_empty() {
            return Err(AgentError::NoOutputs(configured));
        }

        let (processors, aggregate_processors) = builder.processors(config.processor_blocks());
        let aggregators = builder.aggregators(config.aggregator_blocks());
        let inputs = builder.inputs(config.input_blocks(), &global_tags, &metrics_tx);
        let skipped = builder.skipped;

        debug!(
            inputs = inputs.len(),
            outputs = outputs.len(),
            processors = processors.len(),
            aggregators = aggregators.len(),
            skipped = skipped.len(),
            "agent built"
        );

        Ok(Self {
            agent,
            metrics_config: config.metrics.clone(),
            hub,
            inputs,
            outputs,
            processors,
            aggregate_processors,
            aggregators,
            metrics_tx,
            metrics_rx,
            aggregated_tx,
            aggregated_rx,
            skipped,
        })
    }

    /// Blocks left out while building
    pub fn skipped(&self) -> &[SkippedPlugin] {
        &self.skipped
    }

    pub fn hub(&self) -> &Arc<MetricsHub> {
        &self.hub
    }

    /// Every built plugin instance, grouped by kind
    ///
    /// Processors are listed once, in execution order.
    pub fn plugins(&self) -> Vec<PluginInfo> {
        let mut list = Vec::new();
        for input in &self.inputs {
            list.push(PluginInfo {
                kind: PluginKind::Input,
                id: input.id().to_string(),
                plugin: input.plugin().to_string(),
            });
        }
        for id in self.processors.ids() {
            let plugin = self
                .processors
                .get(id)
                .map(|p| p.plugin().to_string())
                .unwrap_or_default();
            list.push(PluginInfo {
                kind: PluginKind::Processor,
                id: id.to_string(),
                plugin,
            });
        }
        for aggregator in &self.aggregators {
            list.push(PluginInfo {
                kind: PluginKind::Aggregator,
                id: aggregator.id().to_string(),
                plugin: aggregator.plugin().to_string(),
            });
        }
        for output in &self.outputs {
            list.push(PluginInfo {
                kind: PluginKind::Output,
                id: output.settings.id.clone(),
                plugin: output.settings.plugin.clone(),
            });
        }
        list
    }

    /// Start, wait for `shutdown`, then stop in order
    ///
    /// # Errors
    ///
    /// Errors of [`Agent::start`] and [`RunningAgent::shutdown`].
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let running = self.start().await?;
        shutdown.cancelled().await;
        info!("shutdown requested");
        running.shutdown().await
    }

    /// Connect outputs and start every task
    ///
    /// # Errors
    ///
    /// `AgentError::NoOutputs` when no output connects.
    pub async fn start(self) -> Result<RunningAgent> {
        let Agent {
            agent,
            metrics_config,
            hub,
            inputs,
            outputs,
            processors,
            aggregate_processors,
            aggregators,
            metrics_tx,
            metrics_rx,
            aggregated_tx,
            aggregated_rx,
            mut skipped,
        } = self;

        let dispatcher = Dispatcher::start(DispatcherConfig {
            workers: agent.flush_workers,
            queue_size: agent.flush_queue_size,
        });
        hub.set_dispatcher(Arc::new(dispatcher.metrics_handle()));

        let configured = outputs.len();
        let mut connected = Vec::with_capacity(configured);
        for pending in outputs {
            let output = RunningOutput::new(pending.settings, pending.sink, dispatcher.clone());
            if let Err(e) = output.connect().await {
                error!(output = %output.id(), error = %e, "output failed to connect, skipping");
                skipped.push(SkippedPlugin::new(PluginKind::Output, &e));
                continue;
            }
            info!(output = %output.id(), plugin = output.plugin(), "output connected");
            hub.add_output(Arc::new(output.metrics_handle()));
            connected.push(Arc::new(output));
        }
        if connected.is_empty() {
            if let Err(e) = dispatcher.shutdown(agent.shutdown_timeout).await {
                warn!(error = %e, "dispatcher stop failed");
            }
            return Err(AgentError::NoOutputs(configured));
        }

        let pipeline = Arc::new(Pipeline {
            processors,
            aggregate_processors,
            aggregators,
            outputs: connected,
        });

        let aggregator_cancel = CancellationToken::new();
        let aggregator_tasks = pipeline
            .aggregators
            .iter()
            .map(|aggregator| {
                tokio::spawn(
                    Arc::clone(aggregator).run(aggregated_tx.clone(), aggregator_cancel.clone()),
                )
            })
            .collect();
        drop(aggregated_tx);

        let ingest_cancel = CancellationToken::new();
        let ingest_task = tokio::spawn(ingest::run(
            Arc::clone(&pipeline),
            metrics_rx,
            aggregated_rx,
            ingest_cancel.clone(),
        ));
        drop(metrics_tx);

        let input_cancel = CancellationToken::new();
        let mut input_tasks = Vec::with_capacity(inputs.len());
        let mut started = Vec::with_capacity(inputs.len());
        for input in inputs {
            if input.is_service() {
                if let Err(e) = input.start_service().await {
                    error!(input = %input.id(), error = %e, "service input failed to start, skipping");
                    skipped.push(SkippedPlugin::new(PluginKind::Input, &e));
                    input.close();
                    continue;
                }
            }
            input_tasks.push(tokio::spawn(Arc::clone(&input).run(input_cancel.child_token())));
            started.push(input);
        }

        let reporter_cancel = CancellationToken::new();
        let reporter_task = metrics_config.enabled.then(|| {
            let reporter = UnifiedReporter::builder()
                .config(metrics_config.clone())
                .hub(Arc::clone(&hub))
                .build();
            tokio::spawn(reporter.run(reporter_cancel.clone()))
        });

        info!(
            inputs = started.len(),
            outputs = pipeline.outputs.len(),
            processors = pipeline.processors.len(),
            aggregators = pipeline.aggregators.len(),
            flush_workers = dispatcher.worker_count(),
            "agent started"
        );

        Ok(RunningAgent {
            shutdown_timeout: agent.shutdown_timeout,
            hub,
            pipeline,
            dispatcher,
            inputs: started,
            skipped,
            tasks: Mutex::new(Some(Tasks {
                input_cancel,
                inputs: input_tasks,
                aggregator_cancel,
                aggregators: aggregator_tasks,
                ingest_cancel,
                ingest: ingest_task,
                reporter_cancel,
                reporter: reporter_task,
            })),
        })
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("processors", &self.processors.ids())
            .field("aggregators", &self.aggregators.len())
            .field("skipped", &self.skipped)
            .finish()
    }
}

// ============================================================================
// Building
// ============================================================================

struct Builder<'a> {
    plugins: &'a PluginRegistry,
    agent: &'a AgentConfig,
    hub: &'a Arc<MetricsHub>,
    skipped: Vec<SkippedPlugin>,
}

impl Builder<'_> {
    fn skip(&mut self, kind: PluginKind, message: impl ToString) {
        let skipped = SkippedPlugin::new(kind, message);
        error!(kind = kind.as_str(), error = %skipped, "plugin skipped");
        self.skipped.push(skipped);
    }

    /// Decoded blocks; failures are recorded and dropped
    fn decoded<T>(&mut self, kind: PluginKind, blocks: Blocks<T>) -> Vec<PluginBlock<T>> {
        let mut ok = Vec::with_capacity(blocks.len());
        for block in blocks {
            match block {
                Ok(block) => ok.push(block),
                Err(e) => self.skip(kind, e),
            }
        }
        ok
    }

    fn filter(&mut self, kind: PluginKind, id: &str, rules: &FilterRules) -> Option<Filter> {
        match Filter::compile(rules) {
            Ok(filter) => Some(filter),
            Err(e) => {
                self.skip(kind, format!("{} '{id}': {e}", kind.as_str()));
                None
            }
        }
    }

    fn outputs(&mut self, blocks: Blocks<OutputConfig>) -> Vec<PendingOutput> {
        let mut outputs = Vec::new();
        for block in self.decoded(PluginKind::Output, blocks) {
            let config = &block.config;
            let id = instance_id(config.alias.as_deref(), &block.name, block.index);
            let Some(filter) = self.filter(PluginKind::Output, &id, &config.filter) else {
                continue;
            };
            let sink = match self.plugins.outputs().create(&block.name, &config.options) {
                Ok(sink) => sink,
                Err(e) => {
                    self.skip(PluginKind::Output, e);
                    continue;
                }
            };

            outputs.push(PendingOutput {
                settings: OutputSettings {
                    id,
                    plugin: block.name.clone(),
                    filter,
                    flush: FlushSettings {
                        batch_size: config.batch_size(self.agent),
                        buffer_limit: config.buffer_limit(self.agent),
                        flush_interval: config.flush_interval(self.agent),
                        flush_jitter: config.flush_jitter(self.agent),
                    },
                    policy: RoutingPolicy::new(self.agent.routing, self.agent.routing_tag.clone()),
                    destination_limit: config.max_destinations,
                },
                sink,
            });
        }
        outputs
    }

    /// Two independent chains built from the same blocks
    fn processors(&mut self, blocks: Blocks<ProcessorConfig>) -> (ProcessorChain, ProcessorChain) {
        let mut primary = Vec::new();
        let mut aggregate = Vec::new();
        for block in self.decoded(PluginKind::Processor, blocks) {
            let config = &block.config;
            let id = instance_id(config.alias.as_deref(), &block.name, block.index);
            let Some(filter) = self.filter(PluginKind::Processor, &id, &config.filter) else {
                continue;
            };
            let registry = self.plugins.processors();
            let built = registry
                .create(&block.name, &config.options)
                .and_then(|first| Ok((first, registry.create(&block.name, &config.options)?)));
            let (first, second) = match built {
                Ok(pair) => pair,
                Err(e) => {
                    self.skip(PluginKind::Processor, format!("processor '{id}': {e}"));
                    continue;
                }
            };

            let settings = ProcessorSettings {
                id,
                plugin: block.name.clone(),
                order: config.order,
                ordinal: block.ordinal,
                filter,
            };
            primary.push(RunningProcessor::new(settings.clone(), first));
            aggregate.push(RunningProcessor::new(settings, second));
        }
        (ProcessorChain::new(primary), ProcessorChain::new(aggregate))
    }

    fn aggregators(&mut self, blocks: Blocks<AggregatorConfig>) -> Vec<Arc<RunningAggregator>> {
        let mut aggregators = Vec::new();
        for block in self.decoded(PluginKind::Aggregator, blocks) {
            let config = &block.config;
            let id = instance_id(config.alias.as_deref(), &block.name, block.index);
            let Some(filter) = self.filter(PluginKind::Aggregator, &id, &config.filter) else {
                continue;
            };
            let aggregator = match self.plugins.aggregators().create(&block.name, &config.options) {
                Ok(aggregator) => aggregator,
                Err(e) => {
                    self.skip(PluginKind::Aggregator, format!("aggregator '{id}': {e}"));
                    continue;
                }
            };

            let running = Arc::new(RunningAggregator::new(
                AggregatorSettings {
                    id,
                    plugin: block.name.clone(),
                    period: config.period,
                    delay: config.delay,
                    grace: config.grace,
                    drop_original: config.drop_original,
                    filter,
                },
                aggregator,
            ));
            self.hub.add_aggregator(Arc::new(running.metrics_handle()));
            aggregators.push(running);
        }
        aggregators
    }

    fn inputs(
        &mut self,
        blocks: Blocks<InputConfig>,
        global_tags: &Arc<Tags>,
        tx: &MAsyncTx<Metric>,
    ) -> Vec<Arc<RunningInput>> {
        let mut inputs = Vec::new();
        for block in self.decoded(PluginKind::Input, blocks) {
            let config = &block.config;
            let id = instance_id(config.alias.as_deref(), &block.name, block.index);
            let context =
                InputContext::new(Arc::clone(self.hub)).with_data_format(config.data_format.clone());

            let built = self
                .plugins
                .inputs()
                .create(&block.name, &config.options, &context)
                .and_then(|kind| {
                    let settings = InputSettings::from_config(
                        id.as_str(),
                        block.name.as_str(),
                        config,
                        self.agent,
                        Arc::clone(global_tags),
                    )?;
                    RunningInput::new(settings, kind, tx.clone())
                });
            match built {
                Ok(input) => {
                    self.hub.add_input(Arc::new(input.metrics_handle()));
                    inputs.push(Arc::new(input));
                }
                Err(e) => self.skip(PluginKind::Input, e),
            }
        }
        inputs
    }
}

// ============================================================================
// Running
// ============================================================================

struct Tasks {
    input_cancel: CancellationToken,
    inputs: Vec<JoinHandle<()>>,
    aggregator_cancel: CancellationToken,
    aggregators: Vec<JoinHandle<()>>,
    ingest_cancel: CancellationToken,
    ingest: JoinHandle<()>,
    reporter_cancel: CancellationToken,
    reporter: Option<JoinHandle<()>>,
}

/// A started agent
pub struct RunningAgent {
    shutdown_timeout: Duration,
    hub: Arc<MetricsHub>,
    pipeline: Arc<Pipeline>,
    dispatcher: Dispatcher,
    inputs: Vec<Arc<RunningInput>>,
    skipped: Vec<SkippedPlugin>,
    tasks: Mutex<Option<Tasks>>,
}

impl RunningAgent {
    pub fn hub(&self) -> &Arc<MetricsHub> {
        &self.hub
    }

    /// Blocks left out while building or starting
    pub fn skipped(&self) -> &[SkippedPlugin] {
        &self.skipped
    }

    pub fn inputs(&self) -> &[Arc<RunningInput>] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Arc<RunningOutput>] {
        &self.pipeline.outputs
    }

    pub fn is_running(&self) -> bool {
        self.tasks.lock().is_some()
    }

    /// Stop everything, draining buffered metrics into the outputs
    ///
    /// Only the first call does any work.
    ///
    /// # Errors
    ///
    /// `AgentError::Pipeline` when the final drain timed out. Every step
    /// still runs in that case.
    pub async fn shutdown(&self) -> Result<()> {
        let tasks = self.tasks.lock().take();
        let Some(tasks) = tasks else {
            debug!("agent already stopped");
            return Ok(());
        };
        let timeout = self.shutdown_timeout;
        info!("stopping agent");

        tasks.input_cancel.cancel();
        for task in tasks.inputs {
            join("input", task, timeout).await;
        }
        for input in &self.inputs {
            input.stop_service().await;
            input.close();
        }

        tasks.aggregator_cancel.cancel();
        for task in tasks.aggregators {
            join("aggregator", task, timeout).await;
        }

        // Both ingest channels are now closed on the sending side
        let mut ingest = tasks.ingest;
        match tokio::time::timeout(timeout, &mut ingest).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(task = "ingest", error = %e, "task panicked during shutdown"),
            Err(_) => {
                warn!("ingest still has live senders, cancelling");
                tasks.ingest_cancel.cancel();
                join("ingest", ingest, timeout).await;
            }
        }

        self.pipeline.push_aggregators().await;

        let drained = self.dispatcher.shutdown(timeout).await;

        for output in &self.pipeline.outputs {
            if let Err(e) = output.close().await {
                warn!(error = %e, "output close failed");
            }
        }
        self.pipeline.close().await;

        tasks.reporter_cancel.cancel();
        if let Some(task) = tasks.reporter {
            join("reporter", task, timeout).await;
        }

        let totals = self.hub.collect();
        info!(
            gathered = totals.total_gathered(),
            written = totals.total_written(),
            dropped = totals.total_dropped(),
            "agent stopped"
        );

        drained.map_err(AgentError::from)
    }
}

impl std::fmt::Debug for RunningAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningAgent")
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.pipeline.outputs.len())
            .field("running", &self.is_running())
            .finish()
    }
}

async fn join(task: &'static str, handle: JoinHandle<()>, timeout: Duration) {
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(task, error = %e, "task panicked during shutdown"),
        Err(_) => warn!(task, "task did not finish within timeout, continuing shutdown"),
    }
}
