//! Process-local [`CacheDriver`] backed by `quick_cache`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use quick_cache::sync::Cache;

use super::CacheDriver;

const DEFAULT_CAPACITY: usize = 1024;

/// Longest TTL honoured; longer values are clamped.
const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

#[derive(Clone)]
struct Entry {
    bytes: Arc<[u8]>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-process cache store. Entries are not shared with other processes.
pub struct LocalCache {
    name: String,
    entries: Cache<String, Entry>,
}

impl LocalCache {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            entries: Cache::new(capacity),
        }
    }
}

impl CacheDriver for LocalCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        if entry.is_expired(Instant::now()) {
            self.entries.remove(key);
            return Ok(None);
        }
        Ok(Some(entry.bytes.to_vec()))
    }

    fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()> {
        let expires_at = Instant::now() + ttl.min(MAX_TTL);
        self.entries.insert(
            key.to_string(),
            Entry {
                bytes: value.into(),
                expires_at,
            },
        );
        Ok(())
    }

    fn forget(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_returns_payload() {
        let cache = LocalCache::new("array");
        cache.put("k", b"hello".to_vec(), Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some(&b"hello"[..]));
        assert_eq!(cache.name(), "array");
    }

    #[test]
    fn expired_entries_miss() {
        let cache = LocalCache::new("array");
        cache.put("k", b"stale".to_vec(), Duration::ZERO).unwrap();
        assert!(cache.get("k").unwrap().is_none());
        assert!(!cache.forget("k").unwrap());
    }

    #[test]
    fn forget_is_idempotent() {
        let cache = LocalCache::new("array");
        cache.put("k", vec![1], Duration::from_secs(60)).unwrap();
        assert!(cache.forget("k").unwrap());
        assert!(!cache.forget("k").unwrap());
        assert!(cache.get("k").unwrap().is_none());
    }
}
