//! Tests for the metric router

use super::*;
use chrono::Utc;
use std::sync::atomic::AtomicUsize;
use std::thread;
use tally_metric::Origin;

fn metric(plugin: &str, instance: &str, tenant: &str) -> Metric {
    Metric::new("m", Utc::now())
        .with_tag("tenant", tenant)
        .with_field("v", 1.0)
        .with_origin(Origin::new(plugin, instance))
}

#[test]
fn test_same_identity_same_destination() {
    let router = MetricRouter::new(RoutingPolicy::new(RoutingMode::PerPlugin, Some("tenant".into())));

    let (a, created_a) = router.route(&metric("redis", "r1", "x"), |k| k.clone());
    let (b, created_b) = router.route(&metric("redis", "r1", "x"), |k| k.clone());
    let (c, _) = router.route(&metric("redis", "r1", "y"), |k| k.clone());

    assert!(created_a);
    assert!(!created_b);
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(router.cache().len(), 2);
}

#[test]
fn test_single_mode_shares_one_destination() {
    let router = MetricRouter::new(RoutingPolicy::single());

    let (a, _) = router.route(&metric("redis", "r1", "x"), |k| k.clone());
    let (b, _) = router.route(&metric("nginx", "n1", "y"), |k| k.clone());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(*a, DestinationKey::default_key());
}

#[test]
fn test_overflow_falls_back_to_default() {
    let router = MetricRouter::with_cache(
        RoutingPolicy::new(RoutingMode::PerPlugin, None),
        DestinationCache::with_limit(1),
    );

    router.route(&metric("redis", "r1", "x"), |k| k.clone());
    let (fallback, _) = router.route(&metric("redis", "r2", "x"), |k| k.clone());

    assert_eq!(*fallback, DestinationKey::default_key());
    assert_eq!(router.overflow_count(), 1);
}

#[test]
fn test_well_known_destinations_ignore_limit() {
    let router = MetricRouter::with_cache(
        RoutingPolicy::new(RoutingMode::PerPlugin, None),
        DestinationCache::with_limit(0),
    );

    let (host, created) = router.route(&metric("cpu", "c", "x"), |k| k.clone());
    assert!(created);
    assert_eq!(*host, DestinationKey::host());
    assert_eq!(router.overflow_count(), 0);
}

#[test]
fn test_well_known_destinations_do_not_use_up_limit() {
    let router = MetricRouter::with_cache(
        RoutingPolicy::new(RoutingMode::PerPlugin, None),
        DestinationCache::with_limit(1),
    );

    // Host and default destinations exist before any keyed one
    router.route(&metric("cpu", "c", "x"), |k| k.clone());
    router.route(&metric("", "", "x"), |k| k.clone());
    assert_eq!(router.cache().len(), 2);
    assert_eq!(router.cache().bounded_len(), 0);

    let (keyed, created) = router.route(&metric("redis", "r1", "x"), |k| k.clone());
    assert!(created);
    assert_eq!(*keyed, DestinationKey::new("redis", "r1", None));
    assert_eq!(router.overflow_count(), 0);

    let (fallback, _) = router.route(&metric("redis", "r2", "x"), |k| k.clone());
    assert_eq!(*fallback, DestinationKey::default_key());
    assert_eq!(router.overflow_count(), 1);
}

#[test]
fn test_concurrent_route_creates_one_destination() {
    let router = Arc::new(MetricRouter::new(RoutingPolicy::new(
        RoutingMode::PerPlugin,
        None,
    )));
    let created = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let router = Arc::clone(&router);
            let created = Arc::clone(&created);
            thread::spawn(move || {
                let (dest, _) = router.route(&metric("redis", "r1", "x"), |k| {
                    created.fetch_add(1, Ordering::SeqCst);
                    k.clone()
                });
                dest
            })
        })
        .collect();

    let dests: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(dests.iter().all(|d| Arc::ptr_eq(d, &dests[0])));
}
