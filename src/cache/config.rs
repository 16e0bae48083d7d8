//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_PREFIX: &str = "medrecords-cache";
const DEFAULT_TTL_SECS: u64 = 3600;
const DEFAULT_MEMORY_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve reads from the cache at all.
    pub enabled: bool,
    /// Leading segment of every key; also scopes prefix purges.
    pub prefix: String,
    /// Expiry applied to every entry.
    pub ttl: Duration,
    /// Entry bound for the in-process backend.
    pub memory_capacity: NonZeroUsize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: DEFAULT_PREFIX.to_string(),
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            memory_capacity: NonZeroUsize::new(DEFAULT_MEMORY_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            prefix: settings.prefix.clone(),
            ttl: settings.ttl,
            memory_capacity: settings.memory_capacity,
        }
    }
}

impl CacheConfig {
    /// Key prefix covering every entry of one namespace.
    pub fn namespace_prefix(&self, namespace: &str) -> String {
        format!("{}:{}:", self.prefix, namespace)
    }
}
