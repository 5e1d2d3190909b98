//! Bounded least-recently-used cache of resolved frame lookups.

use indexmap::IndexMap;

use crate::models::{FrameIndex, LabelSet};

/// Default number of frame lookups remembered per video.
pub const DEFAULT_LOOKUP_CACHE_CAPACITY: usize = 16;

/// Hit/miss counters reported by [`FrameLookupCache::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Frame → label-set cache. Insertion order of the underlying `IndexMap` is
/// the access order: the front is least recently used.
#[derive(Clone, Debug)]
pub struct FrameLookupCache {
    max_entries: usize,
    entries: IndexMap<FrameIndex, LabelSet>,
    hits: u64,
    misses: u64,
}

impl Default for FrameLookupCache {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKUP_CACHE_CAPACITY)
    }
}

impl FrameLookupCache {
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            max_entries,
            entries: IndexMap::with_capacity(max_entries),
            hits: 0,
            misses: 0,
        }
    }

    /// Return a copy of the cached labels for `frame_index`, marking it most
    /// recently used.
    pub fn get(&mut self, frame_index: FrameIndex) -> Option<LabelSet> {
        match self.entries.shift_remove(&frame_index) {
            Some(labels) => {
                let result = labels.clone();
                self.entries.insert(frame_index, labels);
                self.hits += 1;
                Some(result)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, frame_index: FrameIndex, labels: LabelSet) {
        self.entries.shift_remove(&frame_index);
        self.entries.insert(frame_index, labels);
        self.evict_over_capacity();
    }

    /// Drop the entry for `frame_index`; returns whether one was present.
    pub fn invalidate(&mut self, frame_index: FrameIndex) -> bool {
        self.entries.shift_remove(&frame_index).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict_over_capacity(&mut self) {
        while self.entries.len() > self.max_entries {
            self.entries.shift_remove_index(0);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn contains(&self, frame_index: FrameIndex) -> bool {
        self.entries.contains_key(&frame_index)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            max_entries: self.max_entries,
            hits: self.hits,
            misses: self.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(ids: &[&str]) -> LabelSet {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_get_miss_then_hit() {
        let mut cache = FrameLookupCache::new(4);
        assert!(cache.get(3).is_none());
        cache.insert(3, labels(&["a"]));
        assert_eq!(cache.get(3), Some(labels(&["a"])));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = FrameLookupCache::new(2);
        cache.insert(1, labels(&["a"]));
        cache.insert(2, labels(&["b"]));
        // Touch 1 so that 2 becomes the eviction candidate.
        assert!(cache.get(1).is_some());
        cache.insert(3, labels(&["c"]));
        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        assert!(cache.contains(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_reinsert_refreshes_value() {
        let mut cache = FrameLookupCache::new(2);
        cache.insert(1, labels(&["a"]));
        cache.insert(1, labels(&["b"]));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(1), Some(labels(&["b"])));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let mut cache = FrameLookupCache::default();
        assert_eq!(cache.capacity(), DEFAULT_LOOKUP_CACHE_CAPACITY);
        cache.insert(1, labels(&["a"]));
        cache.insert(2, labels(&["a"]));
        assert!(cache.invalidate(1));
        assert!(!cache.invalidate(1));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut cache = FrameLookupCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert(1, labels(&["a"]));
        cache.insert(2, labels(&["b"]));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(2));
    }
}
