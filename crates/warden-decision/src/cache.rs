//! TTL-bounded, generation-invalidated, single-flight decision cache
//! (spec.md §4.9).

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use warden_core::fingerprint::combine_fingerprints;

use crate::event::DecisionEvent;

/// Cache key: `fingerprint(context) ⨁ fingerprint(sorted_policy_id_subset)`
/// (spec.md §4.9).
#[must_use]
pub fn cache_key(context_fp: &str, policy_set_fp: &str) -> String {
    combine_fingerprints(context_fp, policy_set_fp)
}

struct CacheEntry {
    event: DecisionEvent,
    inserted_at_ms: u64,
    generation: u64,
}

/// A decision cache keyed by `(context, policy subset)` fingerprint.
///
/// Entries expire after `ttl_ms` and are invalidated en masse by
/// [`DecisionCache::invalidate_all`] bumping an internal generation
/// counter; stale-generation entries are treated as misses without
/// being proactively swept. Concurrent callers computing the same key
/// are coalesced onto a single in-flight computation via a per-key
/// lock (spec.md §4.9 "single-flight").
pub struct DecisionCache {
    entries: DashMap<String, CacheEntry>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    generation: AtomicU64,
    ttl_ms: u64,
}

impl DecisionCache {
    /// Build a cache with the given time-to-live, in milliseconds.
    #[must_use]
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            entries: DashMap::new(),
            locks: DashMap::new(),
            generation: AtomicU64::new(0),
            ttl_ms,
        }
    }

    /// Invalidate every entry currently in the cache. Cheap: bumps a
    /// counter rather than clearing the map, so in-flight readers that
    /// started before this call still observe a consistent view.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn is_live(&self, entry: &CacheEntry, now_ms: u64) -> bool {
        entry.generation == self.generation.load(Ordering::SeqCst)
            && now_ms.saturating_sub(entry.inserted_at_ms) < self.ttl_ms
    }

    /// Look up `key`; on a hit, return the cached event. On a miss,
    /// compute it via `compute` under a per-key lock so concurrent
    /// callers for the same key share one computation, then cache and
    /// return the result.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, now_ms: u64, compute: F) -> DecisionEvent
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = DecisionEvent>,
    {
        if let Some(entry) = self.entries.get(key) {
            if self.is_live(&entry, now_ms) {
                return entry.event.clone();
            }
        }

        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(entry) = self.entries.get(key) {
            if self.is_live(&entry, now_ms) {
                return entry.event.clone();
            }
        }

        let event = compute().await;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                event: event.clone(),
                inserted_at_ms: now_ms,
                generation: self.generation.load(Ordering::SeqCst),
            },
        );
        event
    }

    /// Number of entries currently stored, including stale ones not yet
    /// evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
