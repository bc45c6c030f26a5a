use std::time::Duration;

/// Top-level configuration for the resource kit.
#[derive(Debug, Clone)]
pub struct KitConfig {
    /// System configuration store settings.
    pub sys_config: SysConfigSettings,
    /// Pagination defaults and bounds for list endpoints.
    pub pagination: PaginationConfig,
    /// Maximum number of keys accepted by one batch update/delete.
    pub batch_limit: usize,
}

impl Default for KitConfig {
    fn default() -> Self {
        Self {
            sys_config: SysConfigSettings::default(),
            pagination: PaginationConfig::default(),
            batch_limit: 100,
        }
    }
}

/// Settings for the cached system configuration store.
#[derive(Debug, Clone)]
pub struct SysConfigSettings {
    /// Backing collection name.
    pub table: String,
    pub cache: CacheSettings,
    /// Reject values that have no stored form instead of storing them empty.
    pub strict_encoding: bool,
}

impl Default for SysConfigSettings {
    fn default() -> Self {
        Self {
            table: "sys_configs".to_string(),
            cache: CacheSettings::default(),
            strict_encoding: false,
        }
    }
}

/// Where and for how long the config snapshot is cached.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Cache store name. `None` or `"default"` selects the manager's default store.
    pub store: Option<String>,
    pub key: String,
    pub ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            store: Some("default".to_string()),
            key: "apikit.sys-config.cache".to_string(),
            ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Page size defaults for paginated listings.
#[derive(Debug, Clone, Copy)]
pub struct PaginationConfig {
    pub default_limit: u64,
    /// Upper clamp for the `limit` parameter. The lower clamp is always 1.
    pub max_limit: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 15,
            max_limit: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kit_config_defaults() {
        let config = KitConfig::default();
        assert_eq!(config.batch_limit, 100);
        assert_eq!(config.pagination.default_limit, 15);
        assert_eq!(config.pagination.max_limit, 1000);
    }

    #[test]
    fn sys_config_defaults() {
        let settings = SysConfigSettings::default();
        assert_eq!(settings.table, "sys_configs");
        assert!(!settings.strict_encoding);
        assert_eq!(settings.cache.store.as_deref(), Some("default"));
        assert_eq!(settings.cache.key, "apikit.sys-config.cache");
        assert_eq!(settings.cache.ttl, Duration::from_secs(86_400));
    }
}
