//! Pipeline benchmark suite
//!
//! Buffer insert/drain and destination routing, the two operations on the
//! per-metric hot path.
//!
//! Run with: `cargo bench -p tally-pipeline`

use chrono::{DateTime, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tally_config::RoutingMode;
use tally_metric::{Metric, Origin};
use tally_pipeline::{MetricBuffer, RoutingPolicy};
use tally_routing::MetricRouter;

fn metric(instance: usize, ts: DateTime<Utc>) -> Metric {
    Metric::new("cpu", ts)
        .with_tag("host", "bench")
        .with_field("idle", 42.0)
        .with_origin(Origin::new("redis", format!("r{instance}")))
}

/// Benchmark inserts into a buffer below capacity and at capacity
fn bench_buffer_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_add");
    let ts = Utc::now();

    for capacity in [1_000, 10_000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("evicting", capacity), &capacity, |b, &cap| {
            let buffer = MetricBuffer::new(cap);
            for _ in 0..cap {
                buffer.add(metric(0, ts));
            }
            b.iter(|| black_box(buffer.add(metric(0, ts))));
        });
    }

    group.finish();
}

/// Benchmark filling then draining in batches
fn bench_buffer_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_drain");
    let ts = Utc::now();

    for batch_size in [100, 1_000] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, &size| {
                let buffer = MetricBuffer::new(size * 2);
                b.iter(|| {
                    for _ in 0..size {
                        buffer.add(metric(0, ts));
                    }
                    black_box(buffer.drain(size))
                });
            },
        );
    }

    group.finish();
}

/// Benchmark cached destination lookup across many plugin instances
fn bench_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("route");
    let ts = Utc::now();

    for instances in [1, 10, 100] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::from_parameter(instances),
            &instances,
            |b, &n| {
                let router: MetricRouter<usize> =
                    MetricRouter::new(RoutingPolicy::new(RoutingMode::PerPlugin, None));
                let metrics: Vec<Metric> = (0..n).map(|i| metric(i, ts)).collect();
                let mut next = 0;
                b.iter(|| {
                    let m = &metrics[next % n];
                    next += 1;
                    black_box(router.route(m, |_| 0))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_buffer_add, bench_buffer_drain, bench_route);
criterion_main!(benches);
