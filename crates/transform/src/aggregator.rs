//! Windowed aggregator runtime
//!
//! A [`RunningAggregator`] wraps an [`Aggregator`] with a filter and a time
//! window `[start, start + period)`.
//!
//! # Window rules
//!
//! - A metric is accepted when its timestamp lies in
//!   `[start - grace, end + delay]`; anything else is counted as out of
//!   window and skipped
//! - The window is pushed `delay` after it ends; results carry the window
//!   start as timestamp
//! - Pushing resets all series state and opens the next window at the old
//!   end, so windows never overlap
//! - Results not yet sent when the run loop is cancelled are kept and
//!   returned by the next [`RunningAggregator::push`]
//! - A panic in the aggregator's `add` drops that metric; in `push` it
//!   loses that window. Both are counted as errors
//!
//! # Example
//!
//! ```ignore
//! let aggregator = Arc::new(RunningAggregator::new(settings, Box::new(MinMaxAggregator::new())));
//! tokio::spawn(Arc::clone(&aggregator).run(tx, cancel.child_token()));
//!
//! let drop = aggregator.add(&metric);
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use crossfire::MAsyncTx;
use parking_lot::Mutex;
use tally_filter::Filter;
use tally_metric::Metric;
use tally_metrics::{AggregatorMetrics, AggregatorMetricsProvider, AggregatorMetricsSnapshot};
use tally_pipeline::util::{DEFAULT_LOG_INTERVAL, RateLimitedLogger, catch_panic_sync};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::Aggregator;

#[cfg(test)]
#[path = "aggregator_test.rs"]
mod tests;

/// Resolved configuration of one aggregator block
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    /// Instance id (alias or generated)
    pub id: String,
    /// Plugin name
    pub plugin: String,
    pub period: Duration,
    pub delay: Duration,
    pub grace: Duration,
    pub drop_original: bool,
    pub filter: Filter,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

struct State {
    aggregator: Box<dyn Aggregator>,
    window: Window,
}

pub struct RunningAggregator {
    id: Arc<str>,
    plugin: String,
    period: Duration,
    delay: Duration,
    grace: TimeDelta,
    late: TimeDelta,
    span: TimeDelta,
    drop_original: bool,
    filter: Filter,
    state: Mutex<State>,
    /// Pushed results the run loop could not send before cancellation
    unsent: Mutex<Vec<Metric>>,
    metrics: Arc<AggregatorMetrics>,
    errors: RateLimitedLogger,
}

/// Aggregator counters for the metrics reporter
#[derive(Clone)]
pub struct AggregatorMetricsHandle {
    id: Arc<str>,
    plugin: String,
    metrics: Arc<AggregatorMetrics>,
}

impl AggregatorMetricsProvider for AggregatorMetricsHandle {
    fn aggregator_id(&self) -> &str {
        &self.id
    }

    fn aggregator_type(&self) -> &str {
        &self.plugin
    }

    fn snapshot(&self) -> AggregatorMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[inline]
fn to_delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

#[inline]
fn later(t: DateTime<Utc>, d: TimeDelta) -> DateTime<Utc> {
    t.checked_add_signed(d).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[inline]
fn earlier(t: DateTime<Utc>, d: TimeDelta) -> DateTime<Utc> {
    t.checked_sub_signed(d).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl RunningAggregator {
    /// Create an aggregator whose first window starts now
    pub fn new(settings: AggregatorSettings, aggregator: Box<dyn Aggregator>) -> Self {
        let span = to_delta(settings.period);
        let start = Utc::now();
        let errors = RateLimitedLogger::new(settings.id.clone(), DEFAULT_LOG_INTERVAL);
        Self {
            id: Arc::from(settings.id),
            plugin: settings.plugin,
            period: settings.period,
            delay: settings.delay,
            grace: to_delta(settings.grace),
            late: to_delta(settings.delay),
            span,
            drop_original: settings.drop_original,
            filter: settings.filter,
            state: Mutex::new(State {
                aggregator,
                window: Window {
                    start,
                    end: later(start, span),
                },
            }),
            unsent: Mutex::new(Vec::new()),
            metrics: Arc::new(AggregatorMetrics::new()),
            errors,
        }
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
    pub fn drop_original(&self) -> bool {
        self.drop_original
    }

    pub fn metrics_handle(&self) -> AggregatorMetricsHandle {
        AggregatorMetricsHandle {
            id: Arc::clone(&self.id),
            plugin: self.plugin.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Current window as `(start, end)`
    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let window = self.state.lock().window;
        (window.start, window.end)
    }

    /// Move the current window to start at `start`; series state is kept
    pub fn align_window(&self, start: DateTime<Utc>) {
        self.state.lock().window = Window {
            start,
            end: later(start, self.span),
        };
    }

    /// Offer a metric to the aggregator
    ///
    /// Returns true when the caller must not forward the original, which
    /// is the case for every metric the filter selects if `drop_original`
    /// is set, whether or not it lands in the window.
    pub fn add(&self, metric: &Metric) -> bool {
        if !self.filter.matches(metric) {
            return false;
        }
        let Some(selected) = self.filter.select(metric.clone()) else {
            return false;
        };

        let mut state = self.state.lock();
        let window = state.window;
        let ts = selected.timestamp();
        if ts < earlier(window.start, self.grace) || ts > later(window.end, self.late) {
            self.metrics.record_out_of_window();
            debug!(
                aggregator = %self.id,
                metric = selected.name(),
                timestamp = %ts,
                window_start = %window.start,
                window_end = %window.end,
                "metric outside aggregation window"
            );
            return self.drop_original;
        }

        match catch_panic_sync(|| state.aggregator.add(&selected)) {
            Ok(()) => self.metrics.record_added(),
            Err(panic) => {
                self.metrics.record_error();
                self.errors.error("aggregator panicked, metric dropped", &panic);
            }
        }
        self.drop_original
    }

    /// Emit the current window and open the next one
    ///
    /// Results left unsent by a cancelled run loop come first.
    pub fn push(&self) -> Vec<Metric> {
        let mut state = self.state.lock();
        let window = state.window;

        let mut pushed = match catch_panic_sync(|| state.aggregator.push()) {
            Ok(pushed) => pushed,
            Err(panic) => {
                self.metrics.record_error();
                self.errors.error("aggregator push panicked, window lost", &panic);
                Vec::new()
            }
        };
        for metric in &mut pushed {
            metric.set_timestamp(window.start);
        }
        if let Err(panic) = catch_panic_sync(|| state.aggregator.reset()) {
            self.metrics.record_error();
            self.errors.error("aggregator reset panicked", &panic);
        }
        state.window = Window {
            start: window.end,
            end: later(window.end, self.span),
        };
        drop(state);

        self.metrics.record_push(pushed.len() as u64);
        let mut out = std::mem::take(&mut *self.unsent.lock());
        out.append(&mut pushed);
        out
    }

    /// Panics caught in the wrapped aggregator
    pub fn error_count(&self) -> u64 {
        self.errors.total_error_count()
    }

    /// Push every `period`, `delay` after each window closes
    ///
    /// Aligns the first window to the time this is called. Returns on
    /// cancellation without pushing; the owner does the final push once
    /// upstream has drained. Results of a push interrupted by cancellation
    /// are kept for that final push.
    pub async fn run(self: Arc<Self>, tx: MAsyncTx<Metric>, cancel: CancellationToken) {
        self.align_window(Utc::now());
        let mut deadline = Instant::now() + self.period + self.delay;

        info!(
            aggregator = %self.id,
            period_ms = self.period.as_millis() as u64,
            delay_ms = self.delay.as_millis() as u64,
            "aggregator started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep_until(deadline) => {}
            }

            let metrics = self.push();
            debug!(aggregator = %self.id, count = metrics.len(), "window pushed");
            let mut pending = metrics.into_iter();
            while let Some(metric) = pending.next() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        let mut unsent = self.unsent.lock();
                        unsent.push(metric);
                        unsent.extend(pending);
                        debug!(aggregator = %self.id, unsent = unsent.len(), "aggregator stopped mid-push");
                        return;
                    }
                    sent = tx.send(metric.clone()) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            deadline += self.period;
        }

        debug!(aggregator = %self.id, "aggregator stopped");
    }
}

impl std::fmt::Debug for RunningAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningAggregator")
            .field("id", &self.id)
            .field("plugin", &self.plugin)
            .field("period", &self.period)
            .field("delay", &self.delay)
            .field("drop_original", &self.drop_original)
            .finish()
    }
}
