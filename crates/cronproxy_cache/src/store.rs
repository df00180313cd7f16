use dashmap::DashMap;

use crate::entry::CacheEntry;
use crate::key::CacheKey;

/// In-memory store sharded by key hash. Entries are replaced whole, so a
/// reader sees either the previous entry or the new one.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    inner: DashMap<CacheKey, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, key: CacheKey, entry: CacheEntry) -> Option<CacheEntry> {
        self.inner.insert(key, entry)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
