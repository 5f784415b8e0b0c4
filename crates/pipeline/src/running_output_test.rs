//! Tests for RunningOutput filtering and routing

use super::*;
use crate::{DispatcherConfig, FlushSettings};
use async_trait::async_trait;
use chrono::DateTime;
use std::time::Duration;
use tally_filter::FilterRules;
use tally_metric::Origin;
use tally_routing::{DestinationKey, RoutingMode};

struct NullOutput;

#[async_trait]
impl Output for NullOutput {
    async fn write(&self, _destination: &DestinationKey, _metrics: &[Metric]) -> anyhow::Result<()> {
        Ok(())
    }
}

fn settings(rules: FilterRules, policy: RoutingPolicy) -> OutputSettings {
    OutputSettings {
        id: "null-0".into(),
        plugin: "null".into(),
        filter: Filter::compile(&rules).unwrap(),
        flush: FlushSettings {
            batch_size: 100,
            buffer_limit: 1000,
            flush_interval: Duration::from_secs(3600),
            flush_jitter: Duration::ZERO,
        },
        policy,
        destination_limit: None,
    }
}

fn output(rules: FilterRules, policy: RoutingPolicy) -> RunningOutput {
    let dispatcher = Dispatcher::start(DispatcherConfig::default());
    RunningOutput::new(settings(rules, policy), Arc::new(NullOutput), dispatcher)
}

fn metric(name: &str, plugin: &str, instance: &str) -> Metric {
    Metric::new(name, DateTime::from_timestamp_nanos(0))
        .with_tag("host", "x")
        .with_tag("tenant", "a")
        .with_field("v", 1.0)
        .with_origin(Origin::new(plugin, instance))
}

fn per_plugin() -> RoutingPolicy {
    RoutingPolicy::new(RoutingMode::PerPlugin, None)
}

// ============================================================================
// Filtering
// ============================================================================

#[tokio::test]
async fn test_filtered_metrics_are_counted_not_buffered() {
    let rules = FilterRules {
        namepass: vec!["cpu*".into()],
        ..Default::default()
    };
    let output = output(rules, RoutingPolicy::single());

    output.add(metric("cpu", "cpu", "c0"));
    output.add(metric("mem", "mem", "m0"));

    let snapshot = output.metrics_handle().snapshot();
    assert_eq!(snapshot.metrics_filtered, 1);
    assert_eq!(snapshot.metrics_added, 1);
    assert_eq!(output.destinations()[0].buffered(), 1);
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn test_single_mode_has_one_destination() {
    let output = output(FilterRules::default(), RoutingPolicy::single());
    output.add(metric("a", "redis", "r1"));
    output.add(metric("b", "redis", "r2"));
    output.add(metric("c", "cpu", ""));

    assert_eq!(output.destinations().len(), 1);
    assert_eq!(output.metrics_handle().snapshot().destinations, 1);
}

#[tokio::test]
async fn test_per_plugin_destinations() {
    let output = output(FilterRules::default(), per_plugin());
    output.add(metric("a", "redis", "r1"));
    output.add(metric("a", "redis", "r1"));
    output.add(metric("b", "redis", "r2"));
    output.add(metric("c", "cpu", "c0"));
    output.add(metric("d", "mem", "m0"));

    let keys: Vec<_> = output
        .destinations()
        .iter()
        .map(|d| d.key().clone())
        .collect();
    assert_eq!(
        keys,
        vec![
            DestinationKey::host(),
            DestinationKey::new("redis", "r1", None),
            DestinationKey::new("redis", "r2", None),
        ]
    );

    let r1 = &output.destinations()[1];
    assert_eq!(r1.buffered(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_touch_creates_one_destination() {
    let output = Arc::new(output(FilterRules::default(), per_plugin()));

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let output = Arc::clone(&output);
            tokio::spawn(async move {
                for _ in 0..10 {
                    output.add(metric("a", "redis", "r1"));
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let destinations = output.destinations();
    assert_eq!(destinations.len(), 1);
    assert_eq!(destinations[0].buffered(), 320);
    assert_eq!(output.metrics_handle().snapshot().destinations, 1);
}

#[tokio::test]
async fn test_destination_limit_falls_back_to_default() {
    let dispatcher = Dispatcher::start(DispatcherConfig::default());
    let mut settings = settings(FilterRules::default(), per_plugin());
    settings.destination_limit = Some(1);
    let output = RunningOutput::new(settings, Arc::new(NullOutput), dispatcher);

    output.add(metric("a", "redis", "r1"));
    output.add(metric("b", "redis", "r2"));

    let keys: Vec<_> = output
        .destinations()
        .iter()
        .map(|d| d.key().clone())
        .collect();
    assert_eq!(
        keys,
        vec![
            DestinationKey::default_key(),
            DestinationKey::new("redis", "r1", None),
        ]
    );
    assert_eq!(output.overflow_count(), 1);
}

#[tokio::test]
async fn test_connect_and_close() {
    let output = output(FilterRules::default(), RoutingPolicy::single());
    output.connect().await.unwrap();
    output.close().await.unwrap();
    assert_eq!(output.id(), "null-0");
    assert_eq!(output.plugin(), "null");
}
