//! Destination cache
//!
//! Lazily populated map from [`DestinationKey`] to shared destination
//! handles. Entries live until the cache is drained at shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{DestinationKey, Result, RoutingError};

/// Race-safe, lazily populated destination map
///
/// Steady-state lookups share a read lock. Creation takes the write lock and
/// re-checks the entry, so `make` runs at most once per key even when many
/// tasks touch a new key at the same time. `make` runs under the write lock
/// and must stay cheap; slow setup belongs to the destination itself.
///
/// The limit only counts entries created by
/// [`get_or_create`](Self::get_or_create); well-known destinations added
/// with [`get_or_create_unbounded`](Self::get_or_create_unbounded) are free.
#[derive(Debug)]
pub struct DestinationCache<T> {
    entries: RwLock<Entries<T>>,
    limit: Option<usize>,
}

#[derive(Debug)]
struct Entries<T> {
    map: HashMap<DestinationKey, Arc<T>>,
    /// Entries subject to the limit
    bounded: usize,
}

impl<T> Entries<T> {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            bounded: 0,
        }
    }
}

impl<T> Default for DestinationCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DestinationCache<T> {
    /// Create an unbounded cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries::new()),
            limit: None,
        }
    }

    /// Create a cache that refuses new bounded keys once `limit` exist
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::new()),
            limit: Some(limit),
        }
    }

    /// Look up an existing destination
    pub fn get(&self, key: &DestinationKey) -> Option<Arc<T>> {
        self.entries.read().map.get(key).cloned()
    }

    /// Return the destination for `key`, creating it with `make` if absent
    ///
    /// The flag is true when this call created the entry.
    ///
    /// # Errors
    ///
    /// `RoutingError::LimitReached` if the key is new and `limit` bounded
    /// entries already exist.
    pub fn get_or_create(
        &self,
        key: &DestinationKey,
        make: impl FnOnce(&DestinationKey) -> T,
    ) -> Result<(Arc<T>, bool)> {
        if let Some(existing) = self.get(key) {
            return Ok((existing, false));
        }

        let mut entries = self.entries.write();
        // Another task may have created it between the two locks
        if let Some(existing) = entries.map.get(key) {
            return Ok((Arc::clone(existing), false));
        }
        if let Some(limit) = self.limit {
            if entries.bounded >= limit {
                return Err(RoutingError::limit_reached(limit, key.to_string()));
            }
        }

        let value = Arc::new(make(key));
        entries.map.insert(key.clone(), Arc::clone(&value));
        entries.bounded += 1;
        Ok((value, true))
    }

    /// Like [`get_or_create`](Self::get_or_create) but ignores the limit
    ///
    /// Used for well-known destinations that must always exist.
    pub fn get_or_create_unbounded(
        &self,
        key: &DestinationKey,
        make: impl FnOnce(&DestinationKey) -> T,
    ) -> (Arc<T>, bool) {
        if let Some(existing) = self.get(key) {
            return (existing, false);
        }

        let mut entries = self.entries.write();
        if let Some(existing) = entries.map.get(key) {
            return (Arc::clone(existing), false);
        }
        let value = Arc::new(make(key));
        entries.map.insert(key.clone(), Arc::clone(&value));
        (value, true)
    }

    /// Number of destinations
    pub fn len(&self) -> usize {
        self.entries.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().map.is_empty()
    }

    /// Destinations counted against the limit
    pub fn bounded_len(&self) -> usize {
        self.entries.read().bounded
    }

    /// Snapshot of all destinations, ordered by key
    pub fn values(&self) -> Vec<Arc<T>> {
        let entries = self.entries.read();
        let mut pairs: Vec<_> = entries.map.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs.into_iter().map(|(_, v)| Arc::clone(v)).collect()
    }

    /// Remove and return all destinations, ordered by key
    pub fn drain(&self) -> Vec<(DestinationKey, Arc<T>)> {
        let mut entries = self.entries.write();
        entries.bounded = 0;
        let mut drained: Vec<_> = entries.map.drain().collect();
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        drained
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
