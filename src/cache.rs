//! Best-effort result caching for the recommender.
//!
//! The recommender treats the cache as advisory: a miss, an expired
//! entry, or a cache that does nothing at all only cost recomputation.
//! Nothing in this module returns an error to the caller.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde_json::Value;

/// Key/value store with per-entry expiry. Payloads are JSON values so
/// callers decide their own shape; the recommender stores id/score
/// pairs, never full song records.
pub trait Cache: Send + Sync {
    /// Fetch a live entry, or `None` on miss or expiry.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key` for `ttl`. Overwrites any prior entry.
    fn set(&self, key: &str, value: Value, ttl: Duration);

    /// Drop every entry whose key starts with `prefix`, returning how
    /// many were removed.
    fn delete_prefix(&self, prefix: &str) -> usize;
}

/// In-process cache backed by a mutex-guarded map.
///
/// Expired entries are dropped lazily on lookup and swept wholesale by
/// [`delete_prefix`](Cache::delete_prefix); there is no background
/// eviction thread.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Value, Instant)>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Option<std::sync::MutexGuard<'_, HashMap<String, (Value, Instant)>>> {
        match self.entries.lock() {
            Ok(guard) => Some(guard),
            Err(poisoned) => {
                // A panic while holding the lock leaves entries intact;
                // stale cache data is harmless here.
                warn!("cache mutex poisoned, continuing with existing entries");
                Some(poisoned.into_inner())
            }
        }
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some((value, deadline)) if *deadline > Instant::now() => {
                debug!("cache hit: {key}");
                Some(value.clone())
            }
            Some(_) => {
                entries.remove(key);
                debug!("cache expired: {key}");
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) {
        if let Some(mut entries) = self.lock() {
            entries.insert(key.to_string(), (value, Instant::now() + ttl));
        }
    }

    fn delete_prefix(&self, prefix: &str) -> usize {
        let Some(mut entries) = self.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("cache invalidated {removed} entries under '{prefix}'");
        }
        removed
    }
}

/// Cache that never stores anything. Useful for one-shot CLI runs where
/// the process exits before a second lookup could happen.
pub struct NoopCache;

impl Cache for NoopCache {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _key: &str, _value: Value, _ttl: Duration) {}

    fn delete_prefix(&self, _prefix: &str) -> usize {
        0
    }
}
