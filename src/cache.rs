/*!
 * In-process key/value cache with per-entry expiration.
 *
 * A `TtlCache` is constructed once at startup and handed to the components
 * that need it. Cloning the cache clones a handle: every clone reads and
 * writes the same entries.
 *
 * Entries stored with `Expiration::Default` live for the cache's configured
 * default TTL. Expired entries are never returned by `get`; they are purged
 * from memory by the janitor task started with `start_janitor`.
 */

use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::app_config::CacheConfig;

/// Lifetime requested for a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Use the cache's configured default TTL
    Default,
    /// Keep the entry until it is deleted or the cache is flushed
    Never,
    /// Expire after the given duration
    After(Duration),
}

/// Sentinel expiration meaning "use the cache's configured default"
pub fn default_expiration() -> Expiration {
    Expiration::Default
}

#[derive(Debug, Clone)]
struct CacheItem<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheItem<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Shared time-expiring key/value store
pub struct TtlCache<K, V> {
    /// Internal cache storage
    items: Arc<RwLock<HashMap<K, CacheItem<V>>>>,

    /// Lifetime of entries stored with `Expiration::Default`
    default_ttl: Duration,

    /// Interval between janitor sweeps
    cleanup_interval: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the given default TTL and janitor interval
    pub fn new(default_ttl: Duration, cleanup_interval: Duration) -> Self {
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
            cleanup_interval,
        }
    }

    /// Create a cache from the application configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.default_ttl(), config.cleanup_interval())
    }

    /// Configured lifetime of default-expiration entries
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Configured janitor interval
    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    /// Store a value, replacing any previous entry under the same key
    pub fn set(&self, key: K, value: V, expiration: Expiration) {
        let expires_at = match expiration {
            Expiration::Default => Some(Instant::now() + self.default_ttl),
            Expiration::Never => None,
            Expiration::After(ttl) => Some(Instant::now() + ttl),
        };

        self.items.write().insert(key, CacheItem { value, expires_at });
    }

    /// Get a live value from the cache
    pub fn get(&self, key: &K) -> Option<V> {
        let items = self.items.read();
        let item = items.get(key)?;

        if item.is_expired(Instant::now()) {
            return None;
        }

        Some(item.value.clone())
    }

    /// Remove an entry, returning whether one was present
    pub fn delete(&self, key: &K) -> bool {
        self.items.write().remove(key).is_some()
    }

    /// Remove every entry
    pub fn flush(&self) {
        self.items.write().clear();
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn item_count(&self) -> usize {
        self.items.read().len()
    }

    /// Purge expired entries, returning how many were removed
    pub fn delete_expired(&self) -> usize {
        let now = Instant::now();
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|_, item| !item.is_expired(now));
        before - items.len()
    }

    /// Start the background sweep of expired entries
    ///
    /// The sweep runs every `cleanup_interval` until the returned handle is
    /// dropped or stopped. Must be called from within a tokio runtime.
    pub fn start_janitor(&self) -> JanitorHandle {
        let cache = self.clone();
        let interval = self.cleanup_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let purged = cache.delete_expired();
                if purged > 0 {
                    debug!("Cache janitor purged {} expired entries", purged);
                }
            }
        });

        JanitorHandle { task }
    }
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            default_ttl: self.default_ttl,
            cleanup_interval: self.cleanup_interval,
        }
    }
}

/// Handle to a running janitor; the sweep stops when it is dropped
#[derive(Debug)]
pub struct JanitorHandle {
    task: JoinHandle<()>,
}

impl JanitorHandle {
    /// Stop the janitor
    pub fn stop(self) {
        self.task.abort();
    }

    /// Whether the janitor task is still running
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for JanitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
