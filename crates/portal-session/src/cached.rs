//! Read-through cache in front of another session store
//!
//! Reads are served from a moka cache when possible; every write goes to the
//! inner store first and then refreshes or invalidates the cached copy.

use crate::error::StoreError;
use crate::store::{SessionStore, SharedStore};
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of cached entries
    pub entry_count: u64,
}

/// Session store with a bounded, time-limited local cache
///
/// Cached entries live at most `cache_ttl`, so an entry that expired in the
/// inner store can be served for up to that long. Keep `cache_ttl` well
/// below the session TTL.
#[derive(Debug, Clone)]
pub struct CachedSessionStore {
    inner: SharedStore,
    cache: Cache<String, Arc<Vec<u8>>>,
}

impl CachedSessionStore {
    /// Wrap `inner` with a cache of `max_capacity` entries
    #[must_use]
    pub fn new(inner: SharedStore, max_capacity: u64, cache_ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(cache_ttl)
                .build(),
        }
    }

    /// Get cache statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.cache.entry_count(),
        }
    }

    /// Drop every cached entry (inner store untouched)
    #[inline]
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl SessionStore for CachedSessionStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(cached) = self.cache.get(key).await {
            return Ok(Some(cached.as_ref().clone()));
        }

        let value = self.inner.get(key).await?;
        let Some(bytes) = value else {
            return Ok(None);
        };
        self.cache
            .insert(key.to_string(), Arc::new(bytes.clone()))
            .await;

        // A write between the read and the insert has already invalidated;
        // read again so its value is not shadowed by ours
        let current = self.inner.get(key).await?;
        if current.as_deref() != Some(bytes.as_slice()) {
            self.cache.invalidate(key).await;
        }
        Ok(current)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.inner.set(key, value.clone(), ttl).await?;
        self.cache.insert(key.to_string(), Arc::new(value)).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.cache.invalidate(key).await;
        self.inner.delete(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        // Always decided by the inner store; the cache may be stale
        let swapped = self
            .inner
            .compare_and_swap(key, expected, value.clone(), ttl)
            .await?;
        if swapped {
            self.cache.insert(key.to_string(), Arc::new(value)).await;
        } else {
            self.cache.invalidate(key).await;
        }
        Ok(swapped)
    }

    fn name(&self) -> &'static str {
        "cached"
    }
}
