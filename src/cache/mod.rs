//! Object Caches
//!
//! [`TtlCache`] is an expiring map with an optional background sweep thread.
//! Caches are created through a [`CacheRegistry`] so their sweepers can be
//! stopped together, and domain objects decide when to re-fetch through a
//! [`StalenessGate`].

pub mod registry;
pub mod staleness;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::Result;

// Re-exports for convenience
pub use registry::{CacheRegistry, ManagedCache};
pub use staleness::{cached_or_fetch, sync_object, StalenessGate, Syncable};

/// A cached value and when it was last stored
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub refreshed: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            refreshed: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.refreshed.elapsed()
    }
}

struct Shared<K, V> {
    name: String,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K: Eq + Hash, V> Shared<K, V> {
    fn entries(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evict_older_than(&self, max_age: Duration) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.age() <= max_age);
        before - entries.len()
    }
}

struct Sweeper {
    ttl: Duration,
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

/// Expiring key/value map; clones share the same entries and sweeper
pub struct TtlCache<K, V> {
    shared: Arc<Shared<K, V>>,
    sweeper: Arc<Mutex<Option<Sweeper>>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            sweeper: Arc::clone(&self.sweeper),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                entries: Mutex::new(HashMap::new()),
            }),
            sweeper: Arc::new(Mutex::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.shared.entries().get(key).map(|entry| entry.value.clone())
    }

    /// Store `value`, resetting its age; returns the value it replaced
    pub fn put(&self, key: K, value: V) -> Option<V> {
        self.shared
            .entries()
            .insert(key, CacheEntry::new(value))
            .map(|old| old.value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.shared.entries().remove(key).map(|entry| entry.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shared.entries().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.shared.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.entries().is_empty()
    }

    pub fn clear(&self) {
        self.shared.entries().clear();
    }

    /// Remove entries older than `max_age`; returns how many were removed
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        self.shared.evict_older_than(max_age)
    }

    /// Run one sweep now with the eviction TTL; no-op when eviction is off
    pub fn evict_expired(&self) -> usize {
        match self.ttl() {
            Some(ttl) => self.evict_older_than(ttl),
            None => 0,
        }
    }

    /// TTL of the running sweeper
    pub fn ttl(&self) -> Option<Duration> {
        self.sweeper().as_ref().map(|s| s.ttl)
    }

    pub fn is_evicting(&self) -> bool {
        self.sweeper().is_some()
    }

    /// Start a sweep thread that runs every `ttl` and drops entries older
    /// than `ttl`. Replaces a sweeper already running.
    pub fn start_eviction(&self, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            warn!("Cache '{}': zero TTL, eviction not started", self.name());
            return Ok(());
        }
        self.stop();

        let (stop, stop_rx) = mpsc::channel::<()>();
        let shared: Weak<Shared<K, V>> = Arc::downgrade(&self.shared);
        let name = self.name().to_string();
        let thread = thread::Builder::new()
            .name(format!("p4wire-cache-{}", name))
            .spawn(move || loop {
                match stop_rx.recv_timeout(ttl) {
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(shared) = shared.upgrade() else {
                            break;
                        };
                        let evicted = shared.evict_older_than(ttl);
                        if evicted > 0 {
                            debug!("Cache '{}': evicted {} entries", name, evicted);
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        debug!("Cache '{}': eviction every {:?}", self.name(), ttl);
        *self.sweeper() = Some(Sweeper { ttl, stop, thread });
        Ok(())
    }

    /// Stop the sweep thread and wait for it to exit
    pub fn stop(&self) {
        let sweeper = self.sweeper().take();
        if let Some(sweeper) = sweeper {
            let _ = sweeper.stop.send(());
            if sweeper.thread.join().is_err() {
                warn!("Cache '{}': sweep thread panicked", self.name());
            }
        }
    }

    fn sweeper(&self) -> MutexGuard<'_, Option<Sweeper>> {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}
