use bytes::Bytes;
use http::HeaderMap;

use crate::{entry::CacheEntry, key::CacheKey, store::MemoryCacheStore};

/// Response cache keyed by upstream endpoint.
///
/// Unbounded: one entry per distinct endpoint ever fetched, never evicted.
#[derive(Debug, Default)]
pub struct CacheManager {
    store: MemoryCacheStore,
}

impl CacheManager {
    pub fn new() -> Self {
        Self {
            store: MemoryCacheStore::new(),
        }
    }

    pub fn get(&self, endpoint: &str) -> Option<CacheEntry> {
        self.store.get(&CacheKey::new(endpoint))
    }

    /// Replaces the entry for `endpoint`. Returns true if an older entry
    /// was overwritten.
    pub fn store(&self, endpoint: &str, headers: HeaderMap, body: Bytes) -> bool {
        let entry = CacheEntry::new(headers, body);
        self.store.insert(CacheKey::new(endpoint), entry).is_some()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
