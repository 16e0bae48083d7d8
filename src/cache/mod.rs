//! Read-through response cache for resource endpoints.
//!
//! Entries live in Redis when a URL is configured and in an in-process LRU
//! otherwise. Backend failures are logged and counted, then treated as a
//! miss, so a broken cache never fails a request.
//!
//! Every namespace carries a generation that [`ResponseCache::invalidate`]
//! bumps. Readers take a [`Generation`] before querying the database and
//! [`ResponseCache::put`] drops the value if the namespace moved on, so a
//! read racing a write cannot store the pre-write view.

mod coder;
mod config;
mod keys;
mod lock;
mod store;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use metrics::counter;
use tracing::{debug, warn};

pub use coder::{CachedValue, DecodeError};
pub use config::CacheConfig;
pub use keys::{CacheKeyBuilder, EXCLUDED_ARGS};
pub use store::{CacheBackend, CacheError, MemoryCache, RedisCache};

use lock::mutex_lock;

pub const CACHE_HIT_TOTAL: &str = "medrecords_cache_hit_total";
pub const CACHE_MISS_TOTAL: &str = "medrecords_cache_miss_total";
pub const CACHE_ERROR_TOTAL: &str = "medrecords_cache_error_total";

const SOURCE: &str = "cache";

/// Invalidation count of one namespace, observed before a database read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

#[derive(Clone)]
pub struct ResponseCache {
    config: Arc<CacheConfig>,
    backend: Arc<dyn CacheBackend>,
    generations: Arc<Mutex<HashMap<String, u64>>>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn in_memory(config: CacheConfig) -> Self {
        let backend = Arc::new(MemoryCache::new(config.memory_capacity));
        Self::new(config, backend)
    }

    /// Connects to Redis when `redis_url` is set, otherwise stays in-process.
    pub async fn connect(config: CacheConfig, redis_url: Option<&str>) -> Result<Self, CacheError> {
        match redis_url {
            Some(url) => {
                let backend = Arc::new(RedisCache::connect(url).await?);
                Ok(Self::new(config, backend))
            }
            None => Ok(Self::in_memory(config)),
        }
    }

    pub fn generation(&self, namespace: &str) -> Generation {
        let generations = mutex_lock(&self.generations, SOURCE, "generation");
        Generation(generations.get(namespace).copied().unwrap_or(0))
    }

    fn advance(&self, namespace: &str) {
        let mut generations = mutex_lock(&self.generations, SOURCE, "advance");
        *generations.entry(namespace.to_string()).or_insert(0) += 1;
    }

    pub fn key(&self, namespace: &str, module_path: &str, operation: &str) -> CacheKeyBuilder {
        CacheKeyBuilder::new(&self.config.prefix, namespace, module_path, operation)
    }

    pub async fn get(&self, namespace: &str, key: &str) -> Option<CachedValue> {
        if !self.config.enabled {
            return None;
        }

        let raw = match self.backend.get(key).await {
            Ok(raw) => raw,
            Err(err) => {
                self.record_error(namespace, "get", &err);
                return None;
            }
        };

        let Some(raw) = raw else {
            counter!(CACHE_MISS_TOTAL, "namespace" => namespace.to_string()).increment(1);
            debug!(target = "medrecords::cache", key, outcome = "miss");
            return None;
        };

        match CachedValue::decode(&raw) {
            Ok(value) => {
                counter!(CACHE_HIT_TOTAL, "namespace" => namespace.to_string()).increment(1);
                debug!(target = "medrecords::cache", key, outcome = "hit");
                Some(value)
            }
            Err(err) => {
                self.record_error(namespace, "decode", &err);
                None
            }
        }
    }

    /// Stores a value read while the namespace was at `observed`.
    ///
    /// Nothing is kept when an invalidation happened since then. The
    /// generation is checked again after the write because an invalidation
    /// may land between the check and the backend `set`.
    pub async fn put(
        &self,
        namespace: &str,
        observed: Generation,
        key: &str,
        value: &CachedValue,
    ) {
        if !self.config.enabled {
            return;
        }
        if self.generation(namespace) != observed {
            debug!(target = "medrecords::cache", key, outcome = "stale_skipped");
            return;
        }
        if let Err(err) = self.backend.set(key, value.encode(), self.config.ttl).await {
            self.record_error(namespace, "set", &err);
            return;
        }
        if self.generation(namespace) != observed {
            debug!(target = "medrecords::cache", key, outcome = "stale_dropped");
            if let Err(err) = self.backend.delete(key).await {
                self.record_error(namespace, "delete", &err);
            }
        }
    }

    /// Drops every cached read of the given namespaces.
    pub async fn invalidate(&self, namespaces: &[&str]) {
        if !self.config.enabled {
            return;
        }
        for namespace in namespaces {
            self.advance(namespace);
            let prefix = self.config.namespace_prefix(namespace);
            match self.backend.delete_prefix(&prefix).await {
                Ok(removed) => debug!(
                    target = "medrecords::cache",
                    namespace = *namespace,
                    removed,
                    "cache namespace invalidated"
                ),
                Err(err) => self.record_error(namespace, "invalidate", &err),
            }
        }
    }

    fn record_error(&self, namespace: &str, op: &'static str, err: &dyn std::error::Error) {
        counter!(CACHE_ERROR_TOTAL, "namespace" => namespace.to_string()).increment(1);
        warn!(
            target = "medrecords::cache",
            namespace,
            op,
            error = %err,
            "cache backend failure treated as miss"
        );
    }
}
