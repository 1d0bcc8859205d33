//! Cache registry
//!
//! Owns every cache created for one connection so they can be listed and
//! their sweep threads stopped in one call.

use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::TtlCache;
use crate::config::CacheConfig;
use crate::error::Result;

/// Type-erased view of a cache for the registry
pub trait ManagedCache: Send + Sync {
    fn name(&self) -> &str;
    fn len(&self) -> usize;
    fn evict_expired(&self) -> usize;
    fn stop(&self);
}

impl<K, V> ManagedCache for TtlCache<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
{
    fn name(&self) -> &str {
        TtlCache::name(self)
    }

    fn len(&self) -> usize {
        TtlCache::len(self)
    }

    fn evict_expired(&self) -> usize {
        TtlCache::evict_expired(self)
    }

    fn stop(&self) {
        TtlCache::stop(self)
    }
}

/// Creates caches and stops them together
pub struct CacheRegistry {
    caches: Mutex<Vec<Arc<dyn ManagedCache>>>,
    default_ttl: Duration,
}

impl CacheRegistry {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            caches: Mutex::new(Vec::new()),
            default_ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl())
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// New cache sweeping with the registry's default TTL
    pub fn create<K, V>(&self, name: &str) -> Result<TtlCache<K, V>>
    where
        K: Eq + Hash + Send + 'static,
        V: Clone + Send + 'static,
    {
        self.create_with_ttl(name, self.default_ttl)
    }

    pub fn create_with_ttl<K, V>(&self, name: &str, ttl: Duration) -> Result<TtlCache<K, V>>
    where
        K: Eq + Hash + Send + 'static,
        V: Clone + Send + 'static,
    {
        let cache = TtlCache::new(name);
        cache.start_eviction(ttl)?;
        self.register(Arc::new(cache.clone()));
        Ok(cache)
    }

    /// Track a cache created elsewhere
    pub fn register(&self, cache: Arc<dyn ManagedCache>) {
        debug!("Registering cache '{}'", cache.name());
        self.caches().push(cache);
    }

    pub fn names(&self) -> Vec<String> {
        self.caches().iter().map(|c| c.name().to_string()).collect()
    }

    /// Total number of entries across all caches
    pub fn total_entries(&self) -> usize {
        self.caches().iter().map(|c| c.len()).sum()
    }

    /// Sweep every cache now
    pub fn evict_all(&self) -> usize {
        self.caches().iter().map(|c| c.evict_expired()).sum()
    }

    /// Stop every sweep thread
    pub fn stop_all(&self) {
        let caches: Vec<_> = self.caches().clone();
        for cache in caches {
            cache.stop();
        }
    }

    fn caches(&self) -> MutexGuard<'_, Vec<Arc<dyn ManagedCache>>> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CacheRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("caches", &self.names())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
