use std::future::Future;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::foundation::error::LayercastResult;

/// Default number of live entries.
pub const DEFAULT_MEMORY_CAPACITY: usize = 500;
/// Default per-entry time-to-live.
pub const DEFAULT_MEMORY_TTL: Duration = Duration::from_secs(5 * 60);

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Bounded in-process cache with per-entry expiry.
///
/// Eviction is least-recently-used once `capacity` is reached; expired entries are dropped lazily
/// on lookup. The lock is never held while a value is computed, so concurrent misses for one key
/// may both run their compute function. Values are pure functions of the key, so the last writer
/// winning is harmless.
pub struct MemoryCache<V> {
    inner: Mutex<LruCache<String, Entry<V>>>,
    ttl: Duration,
}

impl<V> std::fmt::Debug for MemoryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("len", &self.inner.lock().len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl<V: Clone> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY, DEFAULT_MEMORY_TTL)
    }
}

impl<V: Clone> MemoryCache<V> {
    /// Create a cache holding at most `capacity` entries (minimum 1) for `ttl` each.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            ttl,
        }
    }

    /// Return the cached value for `key` if present and not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.inner.lock();
        let expired = match guard.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            guard.pop(key);
        }
        None
    }

    /// Store `value` under `key`, resetting its expiry.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.inner.lock().put(key.into(), entry);
    }

    /// Return the cached value, or compute, store and return it.
    ///
    /// Errors from `f` are returned as-is and nothing is stored.
    pub fn get_or_compute<F>(&self, key: &str, f: F) -> LayercastResult<V>
    where
        F: FnOnce() -> LayercastResult<V>,
    {
        if let Some(v) = self.get(key) {
            tracing::debug!(key, "memory cache hit");
            return Ok(v);
        }
        let value = f()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Async variant of [`MemoryCache::get_or_compute`].
    pub async fn get_or_compute_async<F, Fut>(&self, key: &str, f: F) -> LayercastResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = LayercastResult<V>>,
    {
        if let Some(v) = self.get(key) {
            tracing::debug!(key, "memory cache hit");
            return Ok(v);
        }
        let value = f().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Number of stored entries, expired ones included until they are looked up.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Return `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/memory.rs"]
mod tests;
