//! Bounded, expiring storage for rendered responses.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use metrics::{counter, gauge};

use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

struct Entry {
    expires_at: Instant,
    response: CachedResponse,
}

pub struct ResponseCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl ResponseCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the live entry for `key`. Expired entries are dropped on read.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        self.get_at(key, Instant::now())
    }

    pub fn set(&self, key: impl Into<String>, value: CachedResponse, ttl: Duration) {
        self.set_at(key.into(), value, ttl, Instant::now());
    }

    /// Forget every entry.
    pub fn clear(&self) {
        mutex_lock(&self.entries, SOURCE, "clear").clear();
        gauge!("quillpost_index_cache_entries").set(0.0);
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<CachedResponse> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let live = entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.response.clone()));
        match live {
            Some(Some(response)) => Some(response),
            Some(None) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    fn set_at(&self, key: String, value: CachedResponse, ttl: Duration, now: Instant) {
        let mut entries = mutex_lock(&self.entries, SOURCE, "set");
        let entry = Entry {
            expires_at: now + ttl,
            response: value,
        };
        if let Some((evicted, _)) = entries.push(key.clone(), entry)
            && evicted != key
        {
            counter!("quillpost_index_cache_evict_total").increment(1);
        }
        gauge!("quillpost_index_cache_entries").set(entries.len() as f64);
    }
}
