//! TTL-bounded DNS response cache.
//!
//! Keyed by `(qname, qtype, qclass)`. Stored responses carry a
//! placeholder transaction id; a hit rewrites the id to the caller's
//! before handing the bytes back.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;

/// Cache key: normalized name, type, class.
pub type CacheKey = (String, u16, u16);

struct CachedEntry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// LRU of complete wire responses with per-entry expiry.
pub struct ResponseCache {
    entries: LruCache<CacheKey, CachedEntry>,
}

impl ResponseCache {
    /// A cache holding at most `capacity` responses.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("max(1) is non-zero");
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Fetch a live entry, rewriting its transaction id to `id`.
    pub fn get(&mut self, key: &CacheKey, id: u16) -> Option<Vec<u8>> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                let mut bytes = entry.bytes.clone();
                bytes[0..2].copy_from_slice(&id.to_be_bytes());
                return Some(bytes);
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.pop(key);
        }
        None
    }

    /// Store a response for `ttl`.
    pub fn put(&mut self, key: CacheKey, bytes: Vec<u8>, ttl: Duration) {
        if bytes.len() < 12 {
            return; // not a DNS message; nothing to rewrite later
        }
        self.entries.put(
            key,
            CachedEntry {
                bytes,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Drop an entry.
    pub fn invalidate(&mut self, key: &CacheKey) {
        self.entries.pop(key);
    }

    /// Live entry count (expired entries may still be counted until
    /// touched).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
