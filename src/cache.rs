use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::Method;

/// Builds the cache key for a request signature.
///
/// Identical method, endpoint and body produce the same key.
pub fn cache_key(method: Method, endpoint: &str, body: Option<&str>) -> String {
    format!("{method}:{endpoint}:{}", body.unwrap_or_default())
}

/// Cached response payload with its lifetime.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub data: serde_json::Value,
    pub timestamp: Instant,
    /// `None` when the TTL reaches past what `Instant` can represent.
    pub expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(data: serde_json::Value, ttl: Duration) -> Self {
        let timestamp = Instant::now();
        Self {
            data,
            timestamp,
            expires_at: timestamp.checked_add(ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }
}

/// TTL cache for `GET` payloads. Expired entries are evicted on lookup.
#[derive(Debug, Default)]
pub(crate) struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResponseCache {
    pub(crate) fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.data.clone());
            }
        }
        // Re-checked under the shard lock so a fresh concurrent insert survives.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    pub(crate) fn insert(&self, key: String, data: serde_json::Value, ttl: Duration) {
        self.entries.insert(key, CacheEntry::new(data, ttl));
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
