//! Integration Tests for Object Caches
//!
//! TTL expiry with a live sweep thread, the cache registry, and domain
//! objects that re-fetch through their staleness gate.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::thread;
use std::time::Duration;

use p4wire::cache::{cached_or_fetch, sync_object, CacheRegistry, StalenessGate, Syncable};
use p4wire::error::{Error, Result};
use p4wire::session::CommandRunner;
use p4wire::{Command, TtlCache};
use test_utils::*;

#[test]
fn test_entry_survives_half_ttl_and_is_swept_after_ttl() {
    let ttl = Duration::from_millis(200);
    let cache: TtlCache<String, u32> = TtlCache::new("changes");
    cache.start_eviction(ttl).unwrap();
    cache.put("//depot/...".to_string(), 7);

    thread::sleep(ttl / 2);
    assert_eq!(cache.get(&"//depot/...".to_string()), Some(7));

    // past the TTL plus one full sweep interval
    thread::sleep(ttl * 2 + ttl / 2);
    assert!(cache.get(&"//depot/...".to_string()).is_none());
    cache.stop();
}

#[test]
fn test_put_refreshes_age() {
    let cache: TtlCache<u32, u32> = TtlCache::new("refresh");
    cache.put(1, 1);
    thread::sleep(Duration::from_millis(40));
    cache.put(1, 2);
    assert_eq!(cache.evict_older_than(Duration::from_millis(30)), 0);
    assert_eq!(cache.get(&1), Some(2));
}

#[test]
fn test_immediate_sweep_uses_eviction_ttl() {
    let cache: TtlCache<u32, u32> = TtlCache::new("manual");
    cache.start_eviction(Duration::from_secs(60)).unwrap();
    cache.put(1, 1);
    assert_eq!(cache.evict_expired(), 0);
    assert!(cache.contains(&1));

    cache.stop();
    // stopped caches keep no TTL
    assert_eq!(cache.evict_expired(), 0);
    thread::sleep(Duration::from_millis(5));
    assert_eq!(cache.evict_older_than(Duration::ZERO), 1);
}

#[test]
fn test_registry_stops_every_sweeper() {
    let registry = CacheRegistry::new(Duration::from_secs(60));
    let clients: TtlCache<String, String> = registry.create("clients").unwrap();
    let labels: TtlCache<String, String> =
        registry.create_with_ttl("labels", Duration::from_secs(5)).unwrap();
    assert_eq!(labels.ttl(), Some(Duration::from_secs(5)));

    registry.stop_all();
    assert!(!clients.is_evicting());
    assert!(!labels.is_evicting());
    assert_eq!(registry.names(), vec!["clients", "labels"]);
}

/// A server counter, re-read with `p4 counter <name>`
#[derive(Debug, Clone)]
struct Counter {
    name: String,
    value: Option<u64>,
    gate: StalenessGate,
}

impl Counter {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            gate: StalenessGate::new(),
        }
    }
}

impl Syncable for Counter {
    type Key = String;

    fn cache_key(&self) -> String {
        self.name.clone()
    }

    fn gate(&self) -> &StalenessGate {
        &self.gate
    }

    fn gate_mut(&mut self) -> &mut StalenessGate {
        &mut self.gate
    }

    fn refresh(&mut self, runner: &dyn CommandRunner) -> Result<()> {
        let response = runner.run(&Command::p4(["counter", self.name.as_str()]))?;
        let line = response.last_line().unwrap_or_default();
        self.value = Some(line.trim().parse().map_err(|_| Error::Protocol {
            command: format!("p4 counter {}", self.name),
            message: format!("not a number: {}", line),
            exit_code: 0,
        })?);
        Ok(())
    }
}

#[test]
fn test_sync_skips_round_trip_when_fresh() {
    let executor = ScriptedExecutor::new();
    executor.on_subcommand("counter", vec![Reply::info(&["41"]), Reply::info(&["42"])]);
    let session = create_test_session(&executor);
    let cache: TtlCache<String, Counter> = TtlCache::new("counters");
    let threshold = Duration::from_secs(60);

    let mut counter = Counter::new("change");
    assert!(sync_object(&mut counter, &session, &cache, threshold).unwrap());
    assert_eq!(counter.value, Some(41));
    assert_eq!(cache.get(&"change".to_string()).unwrap().value, Some(41));

    assert!(!sync_object(&mut counter, &session, &cache, threshold).unwrap());
    assert_eq!(executor.call_count(), 1);

    counter.gate_mut().invalidate();
    assert!(sync_object(&mut counter, &session, &cache, threshold).unwrap());
    assert_eq!(counter.value, Some(42));
    assert_eq!(executor.call_count(), 2);
}

#[test]
fn test_cached_or_fetch() {
    let executor = ScriptedExecutor::new();
    executor.on_subcommand("counter", vec![Reply::info(&["7"])]);
    let session = create_test_session(&executor);
    let cache: TtlCache<String, Counter> = TtlCache::new("counters");
    let key = "journal".to_string();
    let threshold = Duration::from_secs(60);

    let first = cached_or_fetch(&key, &session, &cache, threshold, || Counter::new("journal"))
        .unwrap();
    let second = cached_or_fetch(&key, &session, &cache, threshold, || Counter::new("journal"))
        .unwrap();
    assert_eq!(first.value, Some(7));
    assert_eq!(second.value, Some(7));
    assert_eq!(executor.call_count(), 1);
}

#[test]
fn test_failed_refresh_leaves_gate_stale() {
    let executor = ScriptedExecutor::new();
    executor.on_subcommand("counter", vec![Reply::error("Protections table is empty.")]);
    let session = create_test_session(&executor);
    let cache: TtlCache<String, Counter> = TtlCache::new("counters");

    let mut counter = Counter::new("change");
    assert!(sync_object(&mut counter, &session, &cache, Duration::from_secs(60)).is_err());
    assert!(counter.gate().out_of_sync(Duration::from_secs(60)));
    assert!(cache.is_empty());
}
