//! Tests for the minmax aggregator

use super::*;
use chrono::{TimeZone, Utc};
use tally_metric::Origin;

fn cpu(host: &str, idle: f64) -> Metric {
    Metric::new("cpu", Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        .with_tag("host", host)
        .with_field("idle", idle)
        .with_field("state", "ok")
        .with_origin(Origin::new("cpu", "cpu-0"))
}

fn field(metric: &Metric, key: &str) -> Option<f64> {
    metric.field(key).and_then(|v| v.as_f64())
}

#[test]
fn test_tracks_extremes_per_series() {
    let mut agg = MinMaxAggregator::new();
    agg.add(&cpu("a", 10.0));
    agg.add(&cpu("a", 2.0));
    agg.add(&cpu("a", 7.0));
    agg.add(&cpu("b", 50.0));

    let out = agg.push();
    assert_eq!(out.len(), 2);

    assert_eq!(out[0].tag("host"), Some("a"));
    assert_eq!(field(&out[0], "idle_min"), Some(2.0));
    assert_eq!(field(&out[0], "idle_max"), Some(10.0));

    assert_eq!(out[1].tag("host"), Some("b"));
    assert_eq!(field(&out[1], "idle_min"), Some(50.0));
    assert_eq!(field(&out[1], "idle_max"), Some(50.0));
}

#[test]
fn test_ignores_non_numeric_fields() {
    let mut agg = MinMaxAggregator::new();
    agg.add(&cpu("a", 1.0));
    let out = agg.push();
    assert!(out[0].field("state_min").is_none());
    assert!(out[0].field("idle").is_none());
}

#[test]
fn test_series_with_only_strings_emits_nothing() {
    let mut agg = MinMaxAggregator::new();
    let metric = Metric::new("status", Utc::now()).with_field("msg", "up");
    agg.add(&metric);
    assert!(agg.push().is_empty());
}

#[test]
fn test_keeps_origin() {
    let mut agg = MinMaxAggregator::new();
    agg.add(&cpu("a", 1.0));
    let out = agg.push();
    assert_eq!(out[0].origin(), &Origin::new("cpu", "cpu-0"));
}

#[test]
fn test_push_does_not_reset_but_reset_does() {
    let mut agg = MinMaxAggregator::new();
    agg.add(&cpu("a", 1.0));
    assert_eq!(agg.push().len(), 1);
    assert_eq!(agg.push().len(), 1);

    agg.reset();
    assert!(agg.push().is_empty());
}
