//! Agent-wide defaults
//!
//! Every plugin inherits these values unless its own block overrides them.

use std::time::Duration;

use serde::Deserialize;

/// How metrics are assigned to destinations
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Every output has one destination (default)
    #[default]
    Single,
    /// Destinations per originating plugin instance
    PerPlugin,
}

/// `[agent]` section
///
/// # Example
///
/// ```toml
/// [agent]
/// interval = "10s"
/// round_interval = true
/// metric_batch_size = 1000
/// metric_buffer_limit = 10000
/// collection_jitter = "0s"
/// flush_interval = "10s"
/// flush_jitter = "0s"
/// precision = "1s"
/// flush_workers = 2
/// routing = "per_plugin"
/// routing_tag = "tenant"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Default collection interval
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Align the first collection to a multiple of the interval
    /// Default: true
    pub round_interval: bool,

    /// Maximum metrics per write
    /// Default: 1000
    pub metric_batch_size: usize,

    /// Capacity of each destination buffer
    /// Default: 10000
    pub metric_buffer_limit: usize,

    /// Upper bound of the random delay before each collection
    /// Default: 0s
    #[serde(with = "humantime_serde")]
    pub collection_jitter: Duration,

    /// Default flush interval
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Upper bound of the random delay added to each flush
    /// Default: 0s
    #[serde(with = "humantime_serde")]
    pub flush_jitter: Duration,

    /// Timestamp precision; derived from the interval when unset
    #[serde(with = "humantime_serde")]
    pub precision: Option<Duration>,

    /// Number of concurrent flush workers
    /// Default: 2
    pub flush_workers: usize,

    /// Capacity of the shared flush work queue
    /// Default: 64
    pub flush_queue_size: usize,

    /// Capacity of the queue between inputs and the transform stage
    /// Default: 10000
    pub ingest_queue_size: usize,

    /// Destination assignment mode
    /// Default: single
    pub routing: RoutingMode,

    /// Tag whose value splits a plugin instance into sub-destinations
    pub routing_tag: Option<String>,

    /// Time allowed for the final drain at shutdown
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Value of the `host` tag; empty means detect from the environment
    pub hostname: String,

    /// Do not add a `host` tag
    /// Default: false
    pub omit_hostname: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            round_interval: true,
            metric_batch_size: 1000,
            metric_buffer_limit: 10_000,
            collection_jitter: Duration::ZERO,
            flush_interval: Duration::from_secs(10),
            flush_jitter: Duration::ZERO,
            precision: None,
            flush_workers: 2,
            flush_queue_size: 64,
            ingest_queue_size: 10_000,
            routing: RoutingMode::Single,
            routing_tag: None,
            shutdown_timeout: Duration::from_secs(5),
            hostname: String::new(),
            omit_hostname: false,
        }
    }
}
