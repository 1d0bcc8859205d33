//! Staleness tracking
//!
//! Each cached domain object carries a [`StalenessGate`]. Before a round
//! trip the gate says whether the object is still fresh; after a successful
//! fetch it records the time.

use std::hash::Hash;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::TtlCache;
use crate::error::Result;
use crate::session::CommandRunner;

/// Last successful sync in epoch milliseconds; 0 means never
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessGate {
    last_sync_millis: i64,
}

impl StalenessGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn out_of_sync(&self, threshold: Duration) -> bool {
        self.out_of_sync_at(now_millis(), threshold)
    }

    /// Whether more than `threshold` has passed between the last sync and `now_millis`
    pub fn out_of_sync_at(&self, now_millis: i64, threshold: Duration) -> bool {
        if self.last_sync_millis == 0 {
            return true;
        }
        let threshold = i64::try_from(threshold.as_millis()).unwrap_or(i64::MAX);
        now_millis.saturating_sub(self.last_sync_millis) > threshold
    }

    /// Record a sync now
    pub fn in_sync(&mut self) {
        self.in_sync_at(now_millis());
    }

    pub fn in_sync_at(&mut self, now_millis: i64) {
        self.last_sync_millis = now_millis;
    }

    /// Force the next check to report out of sync
    pub fn invalidate(&mut self) {
        self.last_sync_millis = 0;
    }

    pub fn last_sync_millis(&self) -> i64 {
        self.last_sync_millis
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        if self.last_sync_millis == 0 {
            return None;
        }
        Utc.timestamp_millis_opt(self.last_sync_millis).single()
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A domain object that is fetched from the server and cached
pub trait Syncable: Clone + Send + 'static {
    type Key: Eq + Hash + Clone + Send + 'static;

    fn cache_key(&self) -> Self::Key;
    fn gate(&self) -> &StalenessGate;
    fn gate_mut(&mut self) -> &mut StalenessGate;

    /// Re-read this object's fields from the server
    fn refresh(&mut self, runner: &dyn CommandRunner) -> Result<()>;
}

/// Refresh `object` if its gate says so, then publish it into `cache`.
///
/// Returns whether a round trip was made.
pub fn sync_object<T: Syncable>(
    object: &mut T,
    runner: &dyn CommandRunner,
    cache: &TtlCache<T::Key, T>,
    threshold: Duration,
) -> Result<bool> {
    if !object.gate().out_of_sync(threshold) {
        return Ok(false);
    }
    object.refresh(runner)?;
    object.gate_mut().in_sync();
    cache.put(object.cache_key(), object.clone());
    Ok(true)
}

/// Cached object for `key`, created by `make` on a miss and synced if stale
pub fn cached_or_fetch<T, F>(
    key: &T::Key,
    runner: &dyn CommandRunner,
    cache: &TtlCache<T::Key, T>,
    threshold: Duration,
    make: F,
) -> Result<T>
where
    T: Syncable,
    F: FnOnce() -> T,
{
    let mut object = cache.get(key).unwrap_or_else(make);
    sync_object(&mut object, runner, cache, threshold)?;
    Ok(object)
}
