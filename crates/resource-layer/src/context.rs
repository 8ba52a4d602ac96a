//! Shared state for dispatching resource operations.

use std::sync::Arc;

use resource_cache::{Cache, CacheAside};
use resource_store::Store;

use crate::config::LayerConfig;
use crate::registry::ResourceRegistry;

/// Collaborators every dispatched operation needs.
///
/// Cloning is cheap; all members are shared.
#[derive(Clone)]
pub struct LayerContext {
    /// Primary store.
    pub store: Arc<dyn Store>,
    /// Cache-aside coordinator, disabled unless a cache is attached.
    pub cache: CacheAside,
    /// Registered kinds.
    pub registry: Arc<ResourceRegistry>,
    /// Timeouts and cache location.
    pub config: LayerConfig,
}

impl std::fmt::Debug for LayerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerContext")
            .field("cache", &self.cache)
            .field("kinds", &self.registry.kinds().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

impl LayerContext {
    /// Context over `store` with no cache and default configuration.
    pub fn new(store: Arc<dyn Store>, registry: Arc<ResourceRegistry>) -> Self {
        let config = LayerConfig::default();
        Self {
            store,
            cache: CacheAside::disabled().with_timeout(config.cache_timeout()),
            registry,
            config,
        }
    }

    /// Attach a cache.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = CacheAside::new(cache).with_timeout(self.config.cache_timeout());
        self
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: LayerConfig) -> Self {
        self.cache = self.cache.with_timeout(config.cache_timeout());
        self.config = config;
        self
    }

    /// Connect the Redis cache named by `config.cache_url`.
    ///
    /// Without a configured URL the context is returned unchanged.
    #[cfg(feature = "redis")]
    pub async fn with_redis_cache(self) -> resource_cache::CacheResult<Self> {
        use resource_cache::{RedisCache, RedisCacheConfig};

        let Some(url) = self.config.cache_url.clone() else {
            tracing::info!("No cache URL configured; running without a shared cache");
            return Ok(self);
        };
        let cache = RedisCache::new(RedisCacheConfig::from_url(url)).await?;
        Ok(self.with_cache(Arc::new(cache)))
    }

    /// Release the cache connection. The store is left to its owner.
    pub async fn close(&self) {
        self.cache.close().await;
    }
}
