//! Tests for the bounded metric buffer

use super::*;
use chrono::DateTime;
use std::sync::Arc;

fn metric(i: i64) -> Metric {
    Metric::new("m", DateTime::from_timestamp_nanos(0)).with_field("seq", i)
}

fn seqs(batch: &[Metric]) -> Vec<i64> {
    batch
        .iter()
        .map(|m| match m.field("seq") {
            Some(tally_metric::FieldValue::Int(v)) => *v,
            other => panic!("unexpected field {other:?}"),
        })
        .collect()
}

// ============================================================================
// Bounding and eviction
// ============================================================================

#[test]
fn test_overflow_keeps_newest_in_order() {
    let buffer = MetricBuffer::new(5);
    for i in 0..8 {
        buffer.add(metric(i));
    }

    assert_eq!(buffer.len(), 5);
    assert_eq!(buffer.dropped(), 3);
    assert_eq!(seqs(&buffer.drain(10)), vec![3, 4, 5, 6, 7]);
}

#[test]
fn test_add_reports_eviction() {
    let buffer = MetricBuffer::new(2);
    assert_eq!(
        buffer.add(metric(0)),
        AddOutcome {
            len: 1,
            evicted: false
        }
    );
    buffer.add(metric(1));
    assert_eq!(
        buffer.add(metric(2)),
        AddOutcome {
            len: 2,
            evicted: true
        }
    );
}

#[test]
fn test_zero_capacity_is_clamped() {
    let buffer = MetricBuffer::new(0);
    assert_eq!(buffer.capacity(), 1);
    buffer.add(metric(0));
    buffer.add(metric(1));
    assert_eq!(seqs(&buffer.drain(5)), vec![1]);
}

// ============================================================================
// Draining
// ============================================================================

#[test]
fn test_consecutive_drains_are_fifo() {
    let buffer = MetricBuffer::new(10);
    for i in 0..4 {
        buffer.add(metric(i));
    }

    assert_eq!(seqs(&buffer.drain(2)), vec![0, 1]);
    assert_eq!(seqs(&buffer.drain(2)), vec![2, 3]);
    assert!(buffer.drain(2).is_empty());
    assert!(buffer.is_empty());
}

#[test]
fn test_drain_more_than_available() {
    let buffer = MetricBuffer::new(10);
    buffer.add(metric(0));
    assert_eq!(buffer.drain(100).len(), 1);
}

#[test]
fn test_concurrent_adds_stay_bounded() {
    let buffer = Arc::new(MetricBuffer::new(100));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    buffer.add(metric(t * 1000 + i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(buffer.len(), 100);
    assert_eq!(buffer.dropped(), 8000 - 100);
}
