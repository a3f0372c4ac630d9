//! Cache manager that dispatches to the configured backend.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::memory::MemoryCache;
use crate::cache::noop::NoOpCache;
use crate::cache::{AppCache, CacheConfig, CacheError};

/// Shared handle to the cache backend.
#[derive(Clone)]
pub struct CacheManager {
    backend: Arc<dyn AppCache>,
    config: CacheConfig,
}

impl CacheManager {
    /// Build the backend for `config`; a disabled cache gets a [`NoOpCache`].
    pub fn new(config: CacheConfig) -> Self {
        let backend: Arc<dyn AppCache> = if config.enabled {
            Arc::new(MemoryCache::new(&config.memory))
        } else {
            Arc::new(NoOpCache)
        };

        tracing::debug!(
            enabled = config.enabled,
            max_size = config.memory.max_size,
            ttl_seconds = config.memory.ttl_seconds,
            "Cache initialized"
        );

        Self { backend, config }
    }

    pub fn with_backend(backend: Arc<dyn AppCache>, config: CacheConfig) -> Self {
        Self { backend, config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    // ========================================================================
    // AppCache proxy methods
    // ========================================================================

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.backend.get(key).await
    }

    pub async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_seconds: Option<u64>,
    ) -> Result<(), CacheError> {
        self.backend.set(key, value, ttl_seconds).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.backend.remove(key).await
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.backend.clear().await
    }

    // ========================================================================
    // JSON helpers
    // ========================================================================

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes, ttl_seconds).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheConfig;
    use std::collections::HashMap;

    #[tokio::test]
    async fn json_values_survive_the_byte_store() {
        let cache = CacheManager::new(CacheConfig::default());
        let mut value = HashMap::new();
        value.insert("step".to_string(), 2);

        cache.set_json("k", &value, Some(60)).await.unwrap();
        let loaded: Option<HashMap<String, i32>> = cache.get_json("k").await.unwrap();
        assert_eq!(loaded, Some(value));
    }

    #[tokio::test]
    async fn disabled_cache_stores_nothing() {
        let cache = CacheManager::new(CacheConfig {
            enabled: false,
            memory: MemoryCacheConfig::default(),
        });
        assert!(!cache.is_enabled());

        cache.set("k", vec![1], None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
