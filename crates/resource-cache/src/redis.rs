//! Redis-backed cache for deployments that share a cache across processes.

use crate::cache::{Cache, CacheError, CacheResult, CacheStats, DEFAULT_ENTRY_TTL};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Redis cache configuration.
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., redis://localhost:6379).
    pub url: String,

    /// Expiry applied to every entry; `None` keeps entries until deleted.
    /// Defaults to [`DEFAULT_ENTRY_TTL`].
    pub ttl: Option<Duration>,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            ttl: Some(DEFAULT_ENTRY_TTL),
        }
    }
}

impl RedisCacheConfig {
    /// Configuration for a URL with the default expiry.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ttl: Some(DEFAULT_ENTRY_TTL),
        }
    }

    /// Set the entry expiry. A zero duration keeps entries until deleted.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }
}

/// Redis-backed cache implementation.
///
/// Keys are stored verbatim, so `users:42` in the layer is `users:42` in
/// Redis. Closing the cache stops further calls but never flushes data.
///
/// # Example
///
/// ```rust,no_run
/// use resource_cache::{Cache, RedisCache, RedisCacheConfig};
///
/// async fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let cache = RedisCache::new(RedisCacheConfig::from_url("redis://localhost:6379")).await?;
///     cache.set("users:42", "{\"id\":\"42\"}".to_string()).await?;
///     Ok(())
/// }
/// ```
pub struct RedisCache {
    /// Redis connection manager for commands.
    conn: ConnectionManager,

    /// Configuration.
    config: RedisCacheConfig,

    /// Statistics.
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,

    /// Set once `close` has been called.
    closed: AtomicBool,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("config", &self.config)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl RedisCache {
    /// Connect to Redis.
    pub async fn new(config: RedisCacheConfig) -> CacheResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| CacheError::ConnectionError(e.to_string()))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::ConnectionError(e.to_string()))?;

        tracing::info!(url = %config.url, "Connected to Redis cache");

        Ok(Self {
            conn,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Connect with default configuration.
    pub async fn with_defaults() -> CacheResult<Self> {
        Self::new(RedisCacheConfig::default()).await
    }

    fn set_command(&self, key: &str, value: String) -> redis::Cmd {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = self.config.ttl {
            cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
        }
        cmd
    }

    fn connection(&self) -> CacheResult<ConnectionManager> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }
        Ok(self.conn.clone())
    }
}

fn backend(e: redis::RedisError) -> CacheError {
    if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
        CacheError::ConnectionError(e.to_string())
    } else {
        CacheError::BackendError(e.to_string())
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection()?;
        let value: Option<String> = conn.get(key).await.map_err(backend)?;

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> CacheResult<()> {
        let mut conn = self.connection()?;

        self.set_command(key, value)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(backend)?;

        self.sets.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(key = %key, "Cached value in Redis");
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: String) -> CacheResult<bool> {
        let mut conn = self.connection()?;

        // SET .. NX replies nil when the key already exists.
        let mut cmd = self.set_command(key, value);
        cmd.arg("NX");
        let reply: Option<String> = cmd.query_async(&mut conn).await.map_err(backend)?;

        let written = reply.is_some();
        if written {
            self.sets.fetch_add(1, Ordering::Relaxed);
        }
        Ok(written)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection()?;
        let removed: u64 = conn.del(key).await.map_err(backend)?;
        self.deletes.fetch_add(removed, Ordering::Relaxed);
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.connection()?;
        conn.exists(key).await.map_err(backend)
    }

    async fn close(&self) -> CacheResult<()> {
        self.closed.store(true, Ordering::Release);
        tracing::debug!("Redis cache closed");
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }
}
