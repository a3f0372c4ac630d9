//! Memory cache implementation using cached::SizedCache.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cached::{Cached, SizedCache};
use tokio::time::Instant;

use crate::cache::{AppCache, CacheError, MemoryCacheConfig};

struct Entry {
    expires_at: Instant,
    value: Vec<u8>,
}

/// In-memory LRU cache with a size limit and per-entry TTL.
///
/// The configured `ttl_seconds` applies to entries stored without a TTL.
/// An explicit TTL is honoured as given, longer or shorter.
pub struct MemoryCache {
    store: Mutex<SizedCache<String, Entry>>,
    default_ttl: Duration,
}

impl MemoryCache {
    pub fn new(config: &MemoryCacheConfig) -> Self {
        let default_ttl = Duration::from_secs(config.ttl_seconds);
        let store = SizedCache::with_size(config.max_size);
        Self {
            store: Mutex::new(store),
            default_ttl,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SizedCache<String, Entry>>, CacheError> {
        self.store
            .lock()
            .map_err(|e| CacheError::Operation(e.to_string()))
    }
}

#[async_trait]
impl AppCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut store = self.lock()?;
        match store.cache_get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => {}
            None => return Ok(None),
        }
        // expired
        store.cache_remove(key);
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_seconds: Option<u64>,
    ) -> Result<(), CacheError> {
        let ttl = ttl_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_ttl);
        let entry = Entry {
            expires_at: Instant::now() + ttl,
            value,
        };
        self.lock()?.cache_set(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.lock()?.cache_remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.lock()?.cache_clear();
        Ok(())
    }
}
