//! Cache-aside system configuration store.
//!
//! [`ConfigStore`] materializes the whole configuration collection as one
//! slug-keyed snapshot. The snapshot lives in process memory and in a
//! [`CacheDriver`] entry (MessagePack encoded); every write discards both so
//! the next read reloads from the backing [`RecordStore`].
//!
//! Concurrent reloads and writes are not serialized: a reload racing a
//! write may briefly serve the pre-write snapshot until the next
//! invalidation.

use std::collections::BTreeMap;
use std::sync::Arc;

use apikit_core::{ConfigValue, Fields, RecordKey, Value};
use parking_lot::RwLock;

use crate::cache::{CacheDriver, CacheManager};
use crate::config::SysConfigSettings;
use crate::storage::{CollectionDef, RecordStore};

/// Slug-keyed configuration snapshot.
pub type ConfigMap = BTreeMap<String, ConfigValue>;

const SLUG: &str = "slug";
const VALUE: &str = "value";

/// Errors raised by [`ConfigStore`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigStoreError {
    /// The value has no stored form and strict encoding is enabled.
    #[error("config value for `{slug}` cannot be stored")]
    Unencodable { slug: String },

    /// Backing record store failure, passed through untranslated.
    #[error(transparent)]
    Store(#[from] anyhow::Error),

    /// The cache driver failed to drop the snapshot entry.
    #[error("config cache failure: {0}")]
    Cache(#[source] anyhow::Error),
}

/// Lazily loaded, cache-backed key/value configuration.
pub struct ConfigStore {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn CacheDriver>,
    settings: SysConfigSettings,
    snapshot: RwLock<Option<Arc<ConfigMap>>>,
}

impl ConfigStore {
    /// Creates a store over `store`, caching in the driver that
    /// `settings.cache.store` resolves to.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        caches: &CacheManager,
        settings: SysConfigSettings,
    ) -> Self {
        let cache = caches.store(settings.cache.store.as_deref());
        Self {
            store,
            cache,
            settings,
            snapshot: RwLock::new(None),
        }
    }

    /// Collection layout expected by the store: keyed by `slug`, with
    /// creation/update timestamps.
    #[must_use]
    pub fn collection_def(settings: &SysConfigSettings) -> CollectionDef {
        CollectionDef::new(settings.table.clone()).keyed_by(SLUG)
    }

    /// Returns the full configuration snapshot, loading it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigStoreError::Store`] if the backing collection cannot be read.
    pub fn get_all(&self) -> Result<Arc<ConfigMap>, ConfigStoreError> {
        if let Some(snapshot) = self.snapshot.read().as_ref() {
            return Ok(snapshot.clone());
        }
        let snapshot = Arc::new(self.load()?);
        *self.snapshot.write() = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Returns one configuration value.
    ///
    /// # Errors
    ///
    /// See [`get_all`](Self::get_all).
    pub fn get(&self, slug: &str) -> Result<Option<ConfigValue>, ConfigStoreError> {
        Ok(self.get_all()?.get(slug).cloned())
    }

    /// Returns one configuration value or `default` when the slug is unset.
    ///
    /// # Errors
    ///
    /// See [`get_all`](Self::get_all).
    pub fn get_or(&self, slug: &str, default: ConfigValue) -> Result<ConfigValue, ConfigStoreError> {
        Ok(self.get(slug)?.unwrap_or(default))
    }

    /// Stores a single value. See [`set_many`](Self::set_many).
    ///
    /// # Errors
    ///
    /// See [`set_many`](Self::set_many).
    pub fn set(
        &self,
        slug: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), ConfigStoreError> {
        self.set_many([(slug.into(), value)])
    }

    /// Stores many values, then invalidates the snapshot.
    ///
    /// Slugs present in the current snapshot are updated, others inserted.
    /// Values with no stored form (null, booleans) are stored empty with a
    /// warning, or rejected before anything is written when
    /// `strict_encoding` is set. The snapshot is invalidated even when a
    /// write fails.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigStoreError::Unencodable`] in strict mode,
    /// [`ConfigStoreError::Store`] on a write failure, and
    /// [`ConfigStoreError::Cache`] if invalidation fails.
    pub fn set_many<I>(&self, entries: I) -> Result<(), ConfigStoreError>
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        let mut encoded = Vec::new();
        for (slug, value) in entries {
            let stored = match ConfigValue::encode(&value) {
                Some(text) => text,
                None if self.settings.strict_encoding => {
                    return Err(ConfigStoreError::Unencodable { slug });
                }
                None => {
                    tracing::warn!(slug = %slug, value = %value, "config value has no stored form, storing empty");
                    String::new()
                }
            };
            encoded.push((slug, stored));
        }

        let written = self.write(encoded);
        self.invalidate()?;
        written
    }

    /// Drops the in-process snapshot and the cache entry. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigStoreError::Cache`] if the cache driver fails.
    pub fn invalidate(&self) -> Result<(), ConfigStoreError> {
        self.snapshot.write().take();
        self.cache
            .forget(&self.settings.cache.key)
            .map_err(ConfigStoreError::Cache)?;
        tracing::debug!(key = %self.settings.cache.key, "config snapshot invalidated");
        Ok(())
    }

    fn write(&self, encoded: Vec<(String, String)>) -> Result<(), ConfigStoreError> {
        let snapshot = self.get_all()?;
        for (slug, text) in encoded {
            if snapshot.contains_key(&slug) {
                let fields = Fields::from([(VALUE.to_string(), Value::String(text))]);
                self.store.update(&RecordKey::Str(slug), fields)?;
            } else {
                let fields = Fields::from([
                    (SLUG.to_string(), Value::String(slug)),
                    (VALUE.to_string(), Value::String(text)),
                ]);
                self.store.create(fields)?;
            }
        }
        Ok(())
    }

    fn load(&self) -> Result<ConfigMap, ConfigStoreError> {
        let key = &self.settings.cache.key;
        match self.cache.get(key) {
            Ok(Some(bytes)) => match rmp_serde::from_slice::<ConfigMap>(&bytes) {
                Ok(map) => return Ok(map),
                Err(err) => tracing::warn!(key = %key, error = %err, "discarding undecodable config cache entry"),
            },
            Ok(None) => {}
            Err(err) => tracing::warn!(key = %key, driver = self.cache.name(), error = %err, "config cache read failed"),
        }

        let rows = self.store.fetch(&self.store.query())?;
        let map: ConfigMap = rows
            .into_iter()
            .map(|record| {
                let slug = record
                    .get(SLUG)
                    .map_or_else(|| record.key.to_string(), Value::to_text);
                let raw = record.get(VALUE).map(Value::to_text).unwrap_or_default();
                (slug, ConfigValue::decode(&raw))
            })
            .collect();
        tracing::debug!(entries = map.len(), "config snapshot loaded from store");

        match rmp_serde::to_vec(&map) {
            Ok(bytes) => {
                if let Err(err) = self.cache.put(key, bytes, self.settings.cache.ttl) {
                    tracing::warn!(key = %key, error = %err, "config cache write failed");
                }
            }
            Err(err) => tracing::warn!(key = %key, error = %err, "config snapshot not cacheable"),
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::{LocalCache, NullCache};
    use crate::storage::MemoryDatabase;

    fn setup(settings: SysConfigSettings) -> (Arc<dyn RecordStore>, ConfigStore) {
        let db = MemoryDatabase::new();
        let table = db.define(ConfigStore::collection_def(&settings));
        let caches = CacheManager::new("default-store", Arc::new(LocalCache::new("default-store")));
        let store = ConfigStore::new(table.clone(), &caches, settings);
        (table, store)
    }

    #[test]
    fn set_then_get_reads_new_value() {
        let (_, store) = setup(SysConfigSettings::default());
        assert!(store.get("a").unwrap().is_none());
        store.set("a", json!(1)).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(ConfigValue::from(1)));

        store.set("a", json!(2)).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(ConfigValue::from(2)));
    }

    #[test]
    fn existing_slug_is_updated_not_duplicated() {
        let (table, store) = setup(SysConfigSettings::default());
        store.set("site", json!("one")).unwrap();
        store.set("site", json!("two")).unwrap();
        assert_eq!(table.count(&table.query()).unwrap(), 1);
        assert_eq!(store.get("site").unwrap(), Some(ConfigValue::from("two")));
    }

    #[test]
    fn numeric_and_padded_slugs_keep_their_exact_key() {
        let (table, store) = setup(SysConfigSettings::default());
        for slug in ["007", " padded "] {
            store.set(slug, json!("first")).unwrap();
            store.set(slug, json!("second")).unwrap();
            assert_eq!(store.get(slug).unwrap(), Some(ConfigValue::from("second")));
            assert!(table.find(&RecordKey::from(slug)).unwrap().is_some());
        }
        assert_eq!(table.count(&table.query()).unwrap(), 2);
        assert!(store.get("7").unwrap().is_none());
    }

    #[test]
    fn snapshot_is_served_from_cache_until_invalidated() {
        let (table, store) = setup(SysConfigSettings::default());
        store.set("title", json!("Old")).unwrap();
        assert_eq!(store.get("title").unwrap(), Some(ConfigValue::from("Old")));

        // Out-of-band write is invisible until invalidation.
        table
            .update(
                &RecordKey::from("title"),
                Fields::from([(VALUE.to_string(), Value::from("New"))]),
            )
            .unwrap();
        assert_eq!(store.get("title").unwrap(), Some(ConfigValue::from("Old")));

        store.invalidate().unwrap();
        store.invalidate().unwrap();
        assert_eq!(store.get("title").unwrap(), Some(ConfigValue::from("New")));
    }

    #[test]
    fn set_many_decodes_by_precedence() {
        let (_, store) = setup(SysConfigSettings::default());
        store
            .set_many([
                ("menu".to_string(), json!({"items": ["a", "b"]})),
                ("ratio".to_string(), json!(0.5)),
                ("name".to_string(), json!("apikit")),
            ])
            .unwrap();
        let all = store.get_all().unwrap();
        assert_eq!(all["menu"], ConfigValue::Structured(json!({"items": ["a", "b"]})));
        assert_eq!(all["ratio"].to_json(), json!(0.5));
        assert_eq!(all["name"], ConfigValue::from("apikit"));
    }

    #[test]
    fn lossy_values_store_empty_by_default() {
        let (_, store) = setup(SysConfigSettings::default());
        store.set("flag", json!(true)).unwrap();
        assert_eq!(store.get("flag").unwrap(), Some(ConfigValue::from("")));
        assert_eq!(store.get_or("missing", ConfigValue::from(3)).unwrap(), ConfigValue::from(3));
    }

    #[test]
    fn strict_encoding_rejects_before_writing() {
        let settings = SysConfigSettings {
            strict_encoding: true,
            ..SysConfigSettings::default()
        };
        let (table, store) = setup(settings);
        let err = store
            .set_many([
                ("ok".to_string(), json!("fine")),
                ("bad".to_string(), json!(null)),
            ])
            .unwrap_err();
        assert!(matches!(err, ConfigStoreError::Unencodable { ref slug } if slug == "bad"));
        assert_eq!(table.count(&table.query()).unwrap(), 0);
    }

    #[test]
    fn works_without_a_shared_cache() {
        let db = MemoryDatabase::new();
        let settings = SysConfigSettings::default();
        let table = db.define(ConfigStore::collection_def(&settings));
        let caches = CacheManager::new("null", Arc::new(NullCache));
        let store = ConfigStore::new(table, &caches, settings);
        store.set("x", json!("y")).unwrap();
        assert_eq!(store.get("x").unwrap(), Some(ConfigValue::from("y")));
    }
}
