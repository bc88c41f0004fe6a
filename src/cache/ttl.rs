//! In-memory TTL cache with optional durable backing
//!
//! `get` on an expired entry returns `None` and removes the entry as a side
//! effect; there is no background sweeper.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::Instant;

use super::key::{CacheKey, KeyFilter};
use super::storage::CacheBackend;

/// A cached value and when it was written
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    written_at: Instant,
}

/// Durable store plus the slice of it this cache owns (what `clear` wipes)
struct Durable {
    backend: Arc<dyn CacheBackend>,
    owned: KeyFilter,
}

/// Time-bounded cache keyed by [`CacheKey`].
///
/// Values are stored as owned clones. When `max_entries` is set, inserting a new
/// key into a full cache evicts the least recently inserted entry.
pub struct TtlCache<V> {
    name: &'static str,
    ttl: Duration,
    max_entries: Option<usize>,
    entries: Mutex<IndexMap<CacheKey, CacheEntry<V>>>,
    durable: Option<Durable>,
}

impl<V> TtlCache<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            max_entries: None,
            entries: Mutex::new(IndexMap::new()),
            durable: None,
        }
    }

    /// Cap the number of in-memory entries.
    pub fn bounded(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    /// Back this cache with durable storage. `owned` selects the stored entries
    /// that belong to this cache.
    pub fn with_backend(mut self, backend: Arc<dyn CacheBackend>, owned: KeyFilter) -> Self {
        self.durable = Some(Durable { backend, owned });
        self
    }

    #[allow(dead_code)]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entries(&self) -> MutexGuard<'_, IndexMap<CacheKey, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.lookup(key).map(|(value, _)| value)
    }

    /// Value plus its age, for staleness decisions.
    pub fn lookup(&self, key: &CacheKey) -> Option<(V, Duration)> {
        let now = Instant::now();
        {
            let mut entries = self.entries();
            if let Some(entry) = entries.get(key) {
                let age = now.saturating_duration_since(entry.written_at);
                if age < self.ttl {
                    debug!("{} cache hit: {} (age {:?})", self.name, key, age);
                    return Some((entry.value.clone(), age));
                }
                debug!("{} cache expired: {}", self.name, key);
                entries.shift_remove(key);
                drop(entries);
                self.backend_remove(key);
                return None;
            }
        }

        let hydrated = self.hydrate(key, now);
        if hydrated.is_none() {
            debug!("{} cache miss: {}", self.name, key);
        }
        hydrated
    }

    /// Store an owned clone of `value`, overwriting any existing entry.
    pub fn set(&self, key: CacheKey, value: &V) {
        self.insert(key.clone(), value.clone(), Instant::now());

        if let Some(durable) = &self.durable {
            let stored = serde_json::to_vec(value)
                .map_err(|e| e.to_string())
                .and_then(|data| {
                    durable
                        .backend
                        .store(&key, &data, self.ttl)
                        .map_err(|e| e.to_string())
                });
            if let Err(e) = stored {
                warn!("{} cache: durable write of {} failed: {}", self.name, key, e);
            }
        }
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.entries().shift_remove(key);
        self.backend_remove(key);
    }

    /// Drop every entry the filter selects.
    pub fn invalidate_matching(&self, filter: &KeyFilter) {
        let removed = {
            let mut entries = self.entries();
            let before = entries.len();
            entries.retain(|key, _| !filter.matches(key));
            before - entries.len()
        };
        debug!("{} cache: invalidated {} entries", self.name, removed);

        if let Some(durable) = &self.durable
            && let Err(e) = durable.backend.remove_matching(filter)
        {
            warn!("{} cache: durable invalidation failed: {}", self.name, e);
        }
    }

    #[allow(dead_code)]
    pub fn clear(&self) {
        self.entries().clear();

        if let Some(durable) = &self.durable
            && let Err(e) = durable.backend.remove_matching(&durable.owned)
        {
            warn!("{} cache: durable clear failed: {}", self.name, e);
        }
    }

    /// Number of in-memory entries, expired ones included until their next read.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, key: CacheKey, value: V, written_at: Instant) {
        let mut entries = self.entries();
        // Re-inserting moves the key to the back of the eviction order.
        entries.shift_remove(&key);
        if let Some(max) = self.max_entries {
            while entries.len() >= max {
                if let Some((evicted, _)) = entries.shift_remove_index(0) {
                    debug!("{} cache evicted: {}", self.name, evicted);
                }
            }
        }
        entries.insert(key, CacheEntry { value, written_at });
    }

    /// Re-populate memory from durable storage, keeping the original write age.
    fn hydrate(&self, key: &CacheKey, now: Instant) -> Option<(V, Duration)> {
        let durable = self.durable.as_ref()?;

        let stored = match durable.backend.load(key) {
            Ok(stored) => stored?,
            Err(e) => {
                warn!("{} cache: durable read of {} failed: {}", self.name, key, e);
                return None;
            }
        };

        let value: V = match serde_json::from_slice(&stored.data) {
            Ok(value) => value,
            Err(e) => {
                warn!("{} cache: discarding undecodable entry {}: {}", self.name, key, e);
                self.backend_remove(key);
                return None;
            }
        };

        let age = (Utc::now() - stored.written_at).to_std().unwrap_or_default();
        if age >= self.ttl {
            debug!("{} cache expired in storage: {}", self.name, key);
            self.backend_remove(key);
            return None;
        }
        let written_at = now.checked_sub(age)?;

        debug!("{} cache hydrated: {} (age {:?})", self.name, key, age);
        self.insert(key.clone(), value.clone(), written_at);
        Some((value, age))
    }

    fn backend_remove(&self, key: &CacheKey) {
        if let Some(durable) = &self.durable
            && let Err(e) = durable.backend.remove(key)
        {
            warn!("{} cache: durable remove of {} failed: {}", self.name, key, e);
        }
    }
}
