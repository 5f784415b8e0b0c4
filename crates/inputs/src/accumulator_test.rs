//! Tests for the ingest accumulator

use super::*;
use chrono::TimeZone;
use crossfire::MAsyncRx;
use tally_filter::FilterRules;

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + chrono::TimeDelta::milliseconds(1_234)
}

fn accumulator(
    settings: AccumulatorSettings,
    capacity: usize,
) -> (MetricAccumulator, MAsyncRx<Metric>, Arc<InputMetrics>) {
    let (tx, rx) = crossfire::mpmc::bounded_async::<Metric>(capacity);
    let metrics = Arc::new(InputMetrics::new());
    (
        MetricAccumulator::new(settings, tx, Arc::clone(&metrics)),
        rx,
        metrics,
    )
}

fn base_settings() -> AccumulatorSettings {
    AccumulatorSettings {
        origin: Origin::new("cpu", "cpu-1"),
        ..Default::default()
    }
}

fn cpu() -> Metric {
    Metric::new("cpu", ts())
        .with_tag("host", "a")
        .with_field("idle", 90.0)
        .with_field("user", 5.0)
}

#[test]
fn test_metric_is_stamped_with_origin() {
    let (acc, rx, metrics) = accumulator(base_settings(), 8);
    acc.add_metric(cpu());

    let got = rx.try_recv().unwrap();
    assert_eq!(got.origin(), &Origin::new("cpu", "cpu-1"));
    assert_eq!(got.timestamp(), ts());
    assert_eq!(metrics.snapshot().metrics_gathered, 1);
}

#[test]
fn test_name_rules_apply_in_order() {
    let settings = AccumulatorSettings {
        name_override: Some("processor".into()),
        name_prefix: Some("host_".into()),
        name_suffix: Some("_total".into()),
        ..base_settings()
    };
    let (acc, rx, _) = accumulator(settings, 8);
    acc.add_metric(cpu());

    assert_eq!(rx.try_recv().unwrap().name(), "host_processor_total");
}

#[test]
fn test_tags_never_replace_existing() {
    let mut tags = Tags::new();
    tags.insert("host".into(), "input".into());
    tags.insert("dc".into(), "input".into());
    let mut global = Tags::new();
    global.insert("dc".into(), "global".into());
    global.insert("env".into(), "global".into());

    let settings = AccumulatorSettings {
        tags,
        global_tags: Arc::new(global),
        ..base_settings()
    };
    let (acc, rx, _) = accumulator(settings, 8);
    acc.add_metric(cpu());

    let got = rx.try_recv().unwrap();
    assert_eq!(got.tag("host"), Some("a"));
    assert_eq!(got.tag("dc"), Some("input"));
    assert_eq!(got.tag("env"), Some("global"));
}

#[test]
fn test_filter_sees_rewritten_metric() {
    let rules = FilterRules {
        namepass: vec!["sys_*".into()],
        fielddrop: vec!["user".into()],
        ..Default::default()
    };
    let settings = AccumulatorSettings {
        name_prefix: Some("sys_".into()),
        filter: tally_filter::Filter::compile(&rules).unwrap(),
        ..base_settings()
    };
    let (acc, rx, metrics) = accumulator(settings, 8);
    acc.add_metric(cpu());
    acc.add_metric(Metric::new("mem", ts()).with_field("user", 1i64));

    let got = rx.try_recv().unwrap();
    assert_eq!(got.name(), "sys_cpu");
    assert!(got.field("user").is_none());
    assert!(got.field("idle").is_some());

    // A metric whose only field is dropped disappears without counting
    assert!(rx.try_recv().is_err());
    assert_eq!(metrics.snapshot().metrics_gathered, 1);
    assert_eq!(metrics.snapshot().metrics_dropped, 0);
}

#[test]
fn test_filtered_metric_is_silent() {
    let rules = FilterRules {
        namedrop: vec!["cpu".into()],
        ..Default::default()
    };
    let settings = AccumulatorSettings {
        filter: tally_filter::Filter::compile(&rules).unwrap(),
        ..base_settings()
    };
    let (acc, rx, metrics) = accumulator(settings, 8);
    acc.add_metric(cpu());

    assert!(rx.try_recv().is_err());
    let snap = metrics.snapshot();
    assert_eq!(snap.metrics_gathered, 0);
    assert_eq!(snap.metrics_dropped, 0);
}

#[test]
fn test_precision_truncates() {
    let settings = AccumulatorSettings {
        precision: Some(Duration::from_secs(1)),
        ..base_settings()
    };
    let (acc, rx, _) = accumulator(settings, 8);
    acc.add_metric(cpu());

    let got = rx.try_recv().unwrap();
    assert_eq!(got.timestamp(), Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 1).unwrap());
}

#[test]
fn test_full_queue_drops_and_counts() {
    let (acc, rx, metrics) = accumulator(base_settings(), 2);
    for _ in 0..5 {
        acc.add_metric(cpu());
    }

    let snap = metrics.snapshot();
    assert_eq!(snap.metrics_gathered, 2);
    assert_eq!(snap.metrics_dropped, 3);
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_closed_queue_drops() {
    let (acc, rx, metrics) = accumulator(base_settings(), 2);
    drop(rx);
    acc.add_metric(cpu());
    assert_eq!(metrics.snapshot().metrics_dropped, 1);
}

#[tokio::test]
async fn test_close_ends_the_stream() {
    let (acc, rx, metrics) = accumulator(base_settings(), 8);
    acc.add_metric(cpu());
    assert!(!acc.is_closed());

    acc.close();
    acc.close();
    assert!(acc.is_closed());
    acc.add_metric(cpu());

    let snap = metrics.snapshot();
    assert_eq!(snap.metrics_gathered, 1);
    assert_eq!(snap.metrics_dropped, 1);

    // Queued metrics are still delivered, then the receiver sees disconnect
    assert!(rx.recv().await.is_ok());
    assert!(rx.recv().await.is_err());
}

#[test]
fn test_typed_helpers() {
    let (acc, rx, _) = accumulator(base_settings(), 8);
    let mut tags = Tags::new();
    tags.insert("iface".into(), "eth0".into());

    acc.add_counter(
        "net",
        vec![("bytes_recv".into(), FieldValue::UInt(42))],
        tags.clone(),
        Some(ts()),
    );
    acc.add_gauge("mem", vec![("used".into(), 1.5.into())], Tags::new(), Some(ts()));
    acc.add_fields("load", vec![("load1".into(), 0.3.into())], tags, None);

    let counter = rx.try_recv().unwrap();
    assert_eq!(counter.metric_type(), MetricType::Counter);
    assert_eq!(counter.tag("iface"), Some("eth0"));
    assert_eq!(counter.field("bytes_recv"), Some(&FieldValue::UInt(42)));

    assert_eq!(rx.try_recv().unwrap().metric_type(), MetricType::Gauge);

    let untyped = rx.try_recv().unwrap();
    assert_eq!(untyped.metric_type(), MetricType::Untyped);
    assert!(untyped.timestamp() > ts());
}

#[test]
fn test_errors_are_counted() {
    let (acc, _rx, metrics) = accumulator(base_settings(), 8);
    acc.add_error(anyhow::anyhow!("disk unreadable"));
    acc.add_error(anyhow::anyhow!("disk unreadable"));
    assert_eq!(metrics.snapshot().gather_errors, 2);
}
