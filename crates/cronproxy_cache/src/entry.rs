use std::time::SystemTime;

use bytes::Bytes;
use http::HeaderMap;

/// Last successful upstream response for one endpoint.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub headers: HeaderMap,
    pub body: Bytes,
    pub fetched_at: SystemTime,
}

impl CacheEntry {
    pub fn new(headers: HeaderMap, body: Bytes) -> Self {
        Self {
            headers,
            body,
            fetched_at: SystemTime::now(),
        }
    }

    /// Seconds since the entry was fetched (0 if the clock went backwards).
    pub fn age_secs(&self) -> u64 {
        self.fetched_at
            .elapsed()
            .map(|age| age.as_secs())
            .unwrap_or(0)
    }
}
