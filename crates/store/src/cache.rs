//! Read-through cache with per-entry TTL
//!
//! Expiry is checked lazily on read. Once the map grows past a threshold,
//! inserts sweep out everything already expired, so high key cardinality
//! costs memory only for live entries and no timer per entry. The threshold
//! rises with the live set, keeping sweeps amortized.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_SWEEP_THRESHOLD: usize = 1_024;

/// Expiry for TTLs that overflow the clock
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug)]
struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    next_sweep: usize,
}

/// Keyed memoization in front of store reads
#[derive(Debug)]
pub struct TtlCache<K, V> {
    state: Mutex<CacheState<K, V>>,
    sweep_threshold: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    sweeps: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_sweep_threshold(DEFAULT_SWEEP_THRESHOLD)
    }

    pub fn with_sweep_threshold(sweep_threshold: usize) -> Self {
        let sweep_threshold = sweep_threshold.max(1);
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                next_sweep: sweep_threshold,
            }),
            sweep_threshold,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sweeps: AtomicU64::new(0),
        }
    }

    /// Live value for `key`, dropping it if expired
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut state = self.state.lock();
        match state.entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                state.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.entries.len() >= state.next_sweep {
            state.entries.retain(|_, entry| entry.is_live(now));
            state.next_sweep = self.sweep_threshold.max(state.entries.len() * 2);
            self.sweeps.fetch_add(1, Ordering::Relaxed);
        }

        let expires_at = now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE);
        state.entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Return the live entry for `key`, or run `compute`, cache its value for
    /// `ttl` and return it. Errors are returned as-is and never cached.
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, ttl: Duration, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute().await?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    pub fn invalidate(&self, key: &K) {
        self.state.lock().entries.remove(key);
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.next_sweep = self.sweep_threshold;
    }

    /// Entries held, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
        }
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub sweeps: u64,
}
