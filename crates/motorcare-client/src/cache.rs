//! Process-wide TTL response cache.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tokio::time::Instant;

static GLOBAL: Lazy<Arc<ResponseCache>> = Lazy::new(|| Arc::new(ResponseCache::new()));

struct CacheEntry {
    value: serde_json::Value,
    stored_at: Instant,
}

/// In-memory cache keyed by operation identity + serialized arguments.
///
/// Entries are never evicted on a schedule; staleness is judged against the
/// caller's TTL at read time, and writes supersede old entries.
#[derive(Default)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance all fetchers share by default, so
    /// independent screens asking for the same data inside the TTL window
    /// reuse one result.
    pub fn global() -> Arc<ResponseCache> {
        GLOBAL.clone()
    }

    /// Read a live entry. An entry whose age has reached `ttl` reads as
    /// absent.
    pub fn get(&self, key: &str, ttl: Duration) -> Option<serde_json::Value> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() < ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub fn put(&self, key: String, value: serde_json::Value) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
