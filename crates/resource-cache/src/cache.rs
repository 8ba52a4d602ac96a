//! Cache capability and the in-memory implementation.
//!
//! Values are opaque strings; the coordinator owns (de)serialization.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Cache error types.
///
/// These never surface from the resource layer; the coordinator logs them
/// and treats the call as a miss.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Backend command failed
    #[error("Cache backend error: {0}")]
    BackendError(String),

    /// The call exceeded its time budget
    #[error("Cache call timed out")]
    Timeout,

    /// The cache was closed
    #[error("Cache closed")]
    Closed,
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Expiry applied to entries when none is configured.
pub const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(300);

/// Key-value cache capability.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get a value. `None` is a miss.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a value, replacing any previous one.
    async fn set(&self, key: &str, value: String) -> CacheResult<()>;

    /// Set a value only when the key holds nothing. Returns whether the value
    /// was written. The check and the write are one atomic step.
    async fn set_if_absent(&self, key: &str, value: String) -> CacheResult<bool>;

    /// Delete a value. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Check whether a key is present.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Release the cache. Stored data is left in place.
    async fn close(&self) -> CacheResult<()>;

    /// Get cache stats.
    async fn stats(&self) -> CacheStats;
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found a value
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Values written
    pub sets: u64,
    /// Keys deleted
    pub deletes: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-memory cache implementation.
///
/// This is suitable for single-process applications and testing.
/// For shared caches across processes, use the Redis backend.
/// Entries expire after [`DEFAULT_ENTRY_TTL`] unless configured otherwise.
pub struct MemoryCache {
    /// Cached values
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    /// Statistics
    stats: Arc<RwLock<CacheStats>>,
    /// Entry lifetime; `None` keeps entries until deleted
    ttl: Option<Duration>,
    /// Set once `close` has been called
    closed: AtomicBool,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("ttl", &self.ttl)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl MemoryCache {
    /// Create an empty cache with the default entry lifetime.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(CacheStats::default())),
            ttl: Some(DEFAULT_ENTRY_TTL),
            closed: AtomicBool::new(false),
        }
    }

    /// Set the entry lifetime. A zero duration keeps entries until deleted.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().await.values().filter(|e| e.is_live(now)).count()
    }

    /// Whether the cache holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }

    fn entry(&self, value: String) -> Entry {
        Entry {
            value,
            expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.ensure_open()?;
        let now = Instant::now();
        let value = self
            .entries
            .read()
            .await
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone());

        // Update stats
        {
            let mut stats = self.stats.write().await;
            if value.is_some() {
                stats.hits += 1;
            } else {
                stats.misses += 1;
            }
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> CacheResult<()> {
        self.ensure_open()?;
        let entry = self.entry(value);
        self.entries.write().await.insert(key.to_string(), entry);
        self.stats.write().await.sets += 1;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: String) -> CacheResult<bool> {
        self.ensure_open()?;
        let now = Instant::now();
        let written = {
            let mut entries = self.entries.write().await;
            if entries.get(key).is_some_and(|e| e.is_live(now)) {
                false
            } else {
                entries.insert(key.to_string(), self.entry(value));
                true
            }
        };
        if written {
            self.stats.write().await.sets += 1;
        }
        Ok(written)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.ensure_open()?;
        if self.entries.write().await.remove(key).is_some() {
            self.stats.write().await.deletes += 1;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.ensure_open()?;
        let now = Instant::now();
        Ok(self.entries.read().await.get(key).is_some_and(|e| e.is_live(now)))
    }

    async fn close(&self) -> CacheResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }
}
