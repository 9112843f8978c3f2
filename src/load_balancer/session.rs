//! Session affinity cache.
//!
//! Maps a caller-supplied session id to the index of the endpoint that
//! served it. Bounded LRU: sessions never close explicitly, so the least
//! recently used ones are evicted once the capacity is reached.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Create a fresh session id for callers that want affinity.
pub fn create_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug)]
pub struct SessionCache {
    entries: Mutex<LruCache<String, usize>>,
}

impl SessionCache {
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Endpoint index bound to `session_id`; refreshes its recency.
    pub fn get(&self, session_id: &str) -> Option<usize> {
        self.entries.lock().get(session_id).copied()
    }

    pub fn bind(&self, session_id: &str, endpoint: usize) {
        self.entries.lock().put(session_id.to_string(), endpoint);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
