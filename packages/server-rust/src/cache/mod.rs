//! Byte-oriented cache drivers and the named-store manager.
//!
//! [`CacheDriver`] is the seam a shared cache backend plugs into.
//! [`LocalCache`] is the process-local driver, [`NullCache`] discards
//! everything, and [`CacheManager`] resolves a configured store name to a
//! driver, falling back to a process-local store for unknown names.

pub mod local;
pub mod manager;
pub mod null;

use std::time::Duration;

pub use local::LocalCache;
pub use manager::CacheManager;
pub use null::NullCache;

/// A key/value cache holding opaque byte payloads with a time-to-live.
///
/// Drivers may be remote, so every operation is fallible.
pub trait CacheDriver: Send + Sync {
    /// Driver name, used in logs.
    fn name(&self) -> &str;

    /// Returns the payload stored under `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Stores `value` under `key` for `ttl`.
    fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> anyhow::Result<()>;

    /// Removes `key`. Returns `true` if an entry was removed.
    fn forget(&self, key: &str) -> anyhow::Result<bool>;
}
