//! No-op [`CacheDriver`] implementation.

use std::time::Duration;

use super::CacheDriver;

/// Cache driver that stores nothing.
///
/// Every read misses, so consumers always fall through to their backing
/// store. Useful for tests and for disabling caching entirely.
pub struct NullCache;

impl CacheDriver for NullCache {
    fn name(&self) -> &str {
        "null"
    }

    fn get(&self, _key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> anyhow::Result<()> {
        Ok(())
    }

    fn forget(&self, _key: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_cache_never_hits() {
        let cache = NullCache;
        cache.put("k", vec![1, 2, 3], Duration::from_secs(60)).unwrap();
        assert!(cache.get("k").unwrap().is_none());
        assert!(!cache.forget("k").unwrap());
    }
}
