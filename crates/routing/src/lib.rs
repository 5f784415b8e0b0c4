//! Tally Routing
//!
//! Decides which destination a metric belongs to and owns the cache of
//! lazily-created destinations.
//!
//! # Design
//!
//! - [`RoutingPolicy`] is a pure function from a metric to a
//!   [`DestinationKey`]: single mode, unknown origin, well-known agent and
//!   host plugins, then per-instance keys with an optional sub-group tag.
//! - [`DestinationCache`] maps keys to shared destination handles. Lookups
//!   take a read lock; only creation takes the write lock, and it re-checks
//!   the entry so concurrent first-touches create exactly one destination.
//! - [`MetricRouter`] combines the two.
//!
//! # Example
//!
//! ```ignore
//! let router = MetricRouter::new(RoutingPolicy::new(RoutingMode::PerPlugin, None));
//!
//! let (destination, created) = router.route(&metric, |key| Destination::new(key.clone()));
//! if created {
//!     start_flush_timer(destination.clone());
//! }
//! destination.add(metric);
//! ```

mod cache;
mod error;
mod key;
mod policy;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tally_metric::Metric;

pub use cache::DestinationCache;
pub use error::{Result, RoutingError};
pub use key::DestinationKey;
pub use policy::{AGENT_PLUGINS, HOST_PLUGINS, RoutingPolicy};
pub use tally_config::RoutingMode;

/// Policy plus destination cache
///
/// When the cache is bounded and full, metrics for new keys fall back to the
/// default destination and are counted as overflow.
#[derive(Debug)]
pub struct MetricRouter<T> {
    policy: RoutingPolicy,
    cache: DestinationCache<T>,
    overflow: AtomicU64,
}

impl<T> MetricRouter<T> {
    pub fn new(policy: RoutingPolicy) -> Self {
        Self::with_cache(policy, DestinationCache::new())
    }

    pub fn with_cache(policy: RoutingPolicy, cache: DestinationCache<T>) -> Self {
        Self {
            policy,
            cache,
            overflow: AtomicU64::new(0),
        }
    }

    /// Resolve the metric's destination, creating it on first use
    ///
    /// Returns the destination and whether this call created it.
    pub fn route(&self, metric: &Metric, make: impl Fn(&DestinationKey) -> T) -> (Arc<T>, bool) {
        let key = self.policy.resolve(metric);
        if key.is_well_known() {
            return self.cache.get_or_create_unbounded(&key, make);
        }
        match self.cache.get_or_create(&key, &make) {
            Ok(found) => found,
            Err(RoutingError::LimitReached { .. }) => {
                self.overflow.fetch_add(1, Ordering::Relaxed);
                self.cache
                    .get_or_create_unbounded(&DestinationKey::default_key(), make)
            }
        }
    }

    #[inline]
    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    #[inline]
    pub fn cache(&self) -> &DestinationCache<T> {
        &self.cache
    }

    /// Metrics rerouted to the default destination because the cache was full
    pub fn overflow_count(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
