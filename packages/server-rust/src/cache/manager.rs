//! Named cache store resolution.

use std::collections::HashMap;
use std::sync::Arc;

use super::{CacheDriver, LocalCache};

/// Name of the process-local store used when a requested store is unknown.
pub const FALLBACK_STORE: &str = "array";

/// Registry of named cache stores.
///
/// Resolution order for [`store`](Self::store): `None` or `"default"`
/// selects the default store; a registered name selects that store; any
/// other name falls back to the process-local [`FALLBACK_STORE`].
pub struct CacheManager {
    default_store: String,
    stores: HashMap<String, Arc<dyn CacheDriver>>,
    fallback: Arc<dyn CacheDriver>,
}

impl CacheManager {
    /// Creates a manager whose default store is `default_name`.
    #[must_use]
    pub fn new(default_name: impl Into<String>, default_driver: Arc<dyn CacheDriver>) -> Self {
        let default_store = default_name.into();
        let mut stores = HashMap::new();
        stores.insert(default_store.clone(), default_driver);
        Self {
            default_store,
            stores,
            fallback: Arc::new(LocalCache::new(FALLBACK_STORE)),
        }
    }

    /// Manager with a single process-local default store.
    #[must_use]
    pub fn local() -> Self {
        let fallback: Arc<dyn CacheDriver> = Arc::new(LocalCache::new(FALLBACK_STORE));
        Self {
            default_store: FALLBACK_STORE.to_string(),
            stores: HashMap::from([(FALLBACK_STORE.to_string(), fallback.clone())]),
            fallback,
        }
    }

    /// Registers an additional named store.
    #[must_use]
    pub fn with_store(mut self, name: impl Into<String>, driver: Arc<dyn CacheDriver>) -> Self {
        self.stores.insert(name.into(), driver);
        self
    }

    #[must_use]
    pub fn default_store(&self) -> &str {
        &self.default_store
    }

    /// Resolves a configured store name to a driver.
    #[must_use]
    pub fn store(&self, name: Option<&str>) -> Arc<dyn CacheDriver> {
        let resolved = match name {
            None | Some("default") => self.default_store.as_str(),
            Some(other) => other,
        };
        if let Some(driver) = self.stores.get(resolved) {
            return driver.clone();
        }
        tracing::warn!(store = resolved, fallback = FALLBACK_STORE, "unknown cache store, using process-local cache");
        self.fallback.clone()
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::local()
    }
}
