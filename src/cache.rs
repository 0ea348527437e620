//! Process-lifetime distance cache.
//!
//! No eviction and no TTL; entries live until [`DistanceCache::clear`].
//! A single `RwLock` guards the map. A poisoned lock is recovered because
//! every write leaves the map consistent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::distance::DistanceResult;
use crate::location::CacheKey;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    /// Lookups answered from the cache since creation or the last clear.
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct DistanceCache {
    entries: RwLock<HashMap<CacheKey, DistanceResult>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DistanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a key, counting the hit or miss.
    pub fn get(&self, key: &CacheKey) -> Option<DistanceResult> {
        let found = self.read().get(key).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Stores a result unless another writer got there first, and returns
    /// whichever value the cache now holds.
    pub fn insert(&self, key: CacheKey, value: DistanceResult) -> DistanceResult {
        self.write().entry(key).or_insert(value).clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&self) {
        self.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, DistanceResult>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, DistanceResult>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
