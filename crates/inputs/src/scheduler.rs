//! Running inputs
//!
//! A [`RunningInput`] binds one input plugin to its resolved settings and
//! drives it on its own interval.
//!
//! # Schedule
//!
//! ```text
//! start ── first_tick_delay ──► tick ── jitter ──► gather ── … ──► tick ── jitter ──► gather
//!                                 │◄──────────── interval ────────────►│
//! ```
//!
//! - With `round_interval`, the first tick lands on the next wall-clock
//!   multiple of the interval. Later ticks are spaced from that anchor and
//!   never re-aligned.
//! - Jitter is drawn per tick from `[0, collection_jitter)` and delays only
//!   that collection; the anchor does not move.
//! - A gather that overruns its interval skips the missed ticks instead of
//!   firing them back to back.
//!
//! # States
//!
//! `Idle → Waiting → Collecting → Idle`, ending in `Stopped` once the run
//! loop observes cancellation. An in-flight gather always completes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossfire::MAsyncTx;
use tally_config::{AgentConfig, InputConfig};
use tally_filter::Filter;
use tally_metric::{Metric, Origin};
use tally_metrics::{InputMetrics, InputMetricsProvider, InputMetricsSnapshot};
use tally_pipeline::util::{catch_panic, random_jitter};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::accumulator::{Accumulator, AccumulatorSettings, MetricAccumulator, Tags};
use crate::precision::effective_precision;
use crate::{InputError, InputKind, Result};

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;

// ============================================================================
// State
// ============================================================================

/// Scheduler state of one input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InputState {
    Idle = 0,
    /// Waiting for the next tick or its jitter
    Waiting = 1,
    Collecting = 2,
    /// Terminal
    Stopped = 3,
}

impl InputState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Waiting,
            2 => Self::Collecting,
            _ => Self::Stopped,
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Resolved configuration of one input block
#[derive(Debug, Clone)]
pub struct InputSettings {
    /// Instance id (alias or generated)
    pub id: String,
    /// Plugin name
    pub plugin: String,
    pub interval: Duration,
    pub round_interval: bool,
    pub collection_jitter: Duration,
    /// Explicit precision; `None` derives one from the interval
    pub precision: Option<Duration>,
    pub name_override: Option<String>,
    pub name_prefix: Option<String>,
    pub name_suffix: Option<String>,
    pub tags: Tags,
    pub global_tags: Arc<Tags>,
    pub filter: Filter,
}

impl InputSettings {
    /// Settings with agent defaults and no rewrites
    pub fn new(id: impl Into<String>, plugin: impl Into<String>, interval: Duration) -> Self {
        Self {
            id: id.into(),
            plugin: plugin.into(),
            interval,
            round_interval: false,
            collection_jitter: Duration::ZERO,
            precision: None,
            name_override: None,
            name_prefix: None,
            name_suffix: None,
            tags: Tags::new(),
            global_tags: Arc::default(),
            filter: Filter::default(),
        }
    }

    /// Resolve an input block against the agent defaults
    ///
    /// Input values win over agent values field by field.
    pub fn from_config(
        id: impl Into<String>,
        plugin: impl Into<String>,
        config: &InputConfig,
        agent: &AgentConfig,
        global_tags: Arc<Tags>,
    ) -> Result<Self> {
        let id = id.into();
        let filter = Filter::compile(&config.filter)
            .map_err(|e| InputError::config(id.as_str(), e.to_string()))?;

        Ok(Self {
            plugin: plugin.into(),
            interval: config.interval.unwrap_or(agent.interval),
            round_interval: agent.round_interval,
            collection_jitter: config.collection_jitter.unwrap_or(agent.collection_jitter),
            precision: config.precision.or(agent.precision),
            name_override: config.name_override.clone(),
            name_prefix: config.name_prefix.clone(),
            name_suffix: config.name_suffix.clone(),
            tags: config.tags.clone(),
            global_tags,
            filter,
            id,
        })
    }
}

/// Delay from `now` until the first collection
///
/// Unaligned inputs wait one interval. Aligned inputs wait for the next
/// wall-clock multiple of the interval, a full interval when `now` sits
/// exactly on one.
pub fn first_tick_delay(now: DateTime<Utc>, interval: Duration, round: bool) -> Duration {
    if !round {
        return interval;
    }
    let step = interval.as_nanos();
    let Some(nanos) = now.timestamp_nanos_opt() else {
        return interval;
    };
    if step == 0 || step > i64::MAX as u128 || nanos < 0 {
        return interval;
    }
    let into_step = nanos as u128 % step;
    Duration::from_nanos((step - into_step) as u64)
}

// ============================================================================
// Metrics handle
// ============================================================================

/// Handle exposing one input's counters
#[derive(Clone)]
pub struct InputMetricsHandle {
    id: Arc<str>,
    plugin: String,
    metrics: Arc<InputMetrics>,
}

impl InputMetricsProvider for InputMetricsHandle {
    fn input_id(&self) -> &str {
        &self.id
    }

    fn input_type(&self) -> &str {
        &self.plugin
    }

    fn snapshot(&self) -> InputMetricsSnapshot {
        self.metrics.snapshot()
    }
}

// ============================================================================
// RunningInput
// ============================================================================

/// An input plugin bound to its schedule and accumulator
pub struct RunningInput {
    id: Arc<str>,
    plugin: String,
    kind: InputKind,
    interval: Duration,
    round_interval: bool,
    collection_jitter: Duration,
    precision: Option<Duration>,
    accumulator: Arc<MetricAccumulator>,
    metrics: Arc<InputMetrics>,
    state: AtomicU8,
    service_started: AtomicBool,
}

impl RunningInput {
    /// Initialize the plugin and bind it to the ingest queue
    ///
    /// # Errors
    ///
    /// `InputError::Init` when the plugin's `init` fails; the input is
    /// never scheduled.
    pub fn new(settings: InputSettings, mut kind: InputKind, tx: MAsyncTx<Metric>) -> Result<Self> {
        kind.init()
            .map_err(|e| InputError::init(settings.id.as_str(), e))?;

        let precision = effective_precision(settings.precision, settings.interval, kind.is_service());
        let metrics = Arc::new(InputMetrics::new());
        let accumulator = MetricAccumulator::new(
            AccumulatorSettings {
                origin: Origin::new(settings.plugin.as_str(), settings.id.as_str()),
                name_override: settings.name_override,
                name_prefix: settings.name_prefix,
                name_suffix: settings.name_suffix,
                tags: settings.tags,
                global_tags: settings.global_tags,
                filter: settings.filter,
                precision,
            },
            tx,
            Arc::clone(&metrics),
        );

        Ok(Self {
            id: Arc::from(settings.id),
            plugin: settings.plugin,
            kind,
            interval: settings.interval,
            round_interval: settings.round_interval,
            collection_jitter: settings.collection_jitter,
            precision,
            accumulator: Arc::new(accumulator),
            metrics,
            state: AtomicU8::new(InputState::Idle as u8),
            service_started: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Timestamp precision applied to this input's metrics
    #[inline]
    pub fn precision(&self) -> Option<Duration> {
        self.precision
    }

    #[inline]
    pub fn is_service(&self) -> bool {
        self.kind.is_service()
    }

    pub fn state(&self) -> InputState {
        InputState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: InputState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn metrics_handle(&self) -> InputMetricsHandle {
        InputMetricsHandle {
            id: Arc::clone(&self.id),
            plugin: self.plugin.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Collect once; errors and panics go to the accumulator
    pub async fn gather_once(&self) {
        let started = Instant::now();
        let gathered = catch_panic(self.kind.gather(self.accumulator.as_ref()))
            .await
            .unwrap_or_else(|panic| Err(anyhow::anyhow!("gather panicked: {panic}")));
        if let Err(e) = gathered {
            self.accumulator.add_error(e);
        }
        self.metrics.record_gather(started.elapsed());
    }

    /// Collection loop; returns once `cancel` fires
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let delay = first_tick_delay(Utc::now(), self.interval, self.round_interval);
        let mut ticker = interval_at(Instant::now() + delay, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            input = %self.id,
            plugin = %self.plugin,
            interval_ms = self.interval.as_millis() as u64,
            first_tick_ms = delay.as_millis() as u64,
            "input started"
        );

        loop {
            self.set_state(InputState::Waiting);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let jitter = random_jitter(self.collection_jitter);
            if !jitter.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = sleep(jitter) => {}
                }
            }

            self.set_state(InputState::Collecting);
            self.gather_once().await;
            debug!(input = %self.id, "gather complete");
            self.set_state(InputState::Idle);
        }

        self.set_state(InputState::Stopped);
        debug!(input = %self.id, "input stopped");
    }

    /// Start a service input; a no-op for polled inputs
    ///
    /// # Errors
    ///
    /// `InputError::Start` when the service fails to start.
    pub async fn start_service(&self) -> Result<()> {
        let InputKind::Service(service) = &self.kind else {
            return Ok(());
        };
        let acc: Arc<dyn Accumulator> = self.accumulator.clone();
        catch_panic(service.start(acc))
            .await
            .unwrap_or_else(|panic| Err(anyhow::anyhow!("start panicked: {panic}")))
            .map_err(|e| InputError::start(self.id.as_ref(), e))?;
        self.service_started.store(true, Ordering::Release);
        info!(input = %self.id, plugin = %self.plugin, "service started");
        Ok(())
    }

    /// Stop a started service input; later calls do nothing
    pub async fn stop_service(&self) {
        let InputKind::Service(service) = &self.kind else {
            return;
        };
        if !self.service_started.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Err(panic) = catch_panic(service.stop()).await {
            warn!(input = %self.id, panic = %panic, "service stop panicked");
        }
        self.set_state(InputState::Stopped);
        info!(input = %self.id, "service stopped");
    }

    /// Whether a service input has been started and not stopped
    pub fn service_running(&self) -> bool {
        self.service_started.load(Ordering::Acquire)
    }

    /// Release this input's end of the ingest queue
    ///
    /// Call after the run loop and any service have stopped; metrics
    /// offered afterwards are counted as dropped.
    pub fn close(&self) {
        self.accumulator.close();
    }

    pub fn is_closed(&self) -> bool {
        self.accumulator.is_closed()
    }
}

impl Drop for RunningInput {
    fn drop(&mut self) {
        if self.service_started.load(Ordering::Acquire) {
            warn!(input = %self.id, "service input dropped without stop");
        }
    }
}

impl std::fmt::Debug for RunningInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningInput")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("interval", &self.interval)
            .field("round_interval", &self.round_interval)
            .field("collection_jitter", &self.collection_jitter)
            .field("precision", &self.precision)
            .field("state", &self.state())
            .finish()
    }
}
