//! # Cache-aside coordinator
//!
//! Wraps store reads and writes with an optional [`Cache`]. The store stays
//! the source of truth: cache entries are only ever written from committed
//! store state, and every cache failure or timeout is logged and treated as a
//! miss. With no cache configured every call passes straight to the store.
//!
//! Write paths call the hooks explicitly:
//!
//! ```text
//! read:           fetch_one (cache, else store -> fill empty key)
//! query:          store fetch -> on_fetched (fill empty keys)
//! create/update:  store commit -> on_create_or_update
//! delete:         on_before_delete (reload, evict) -> store delete -> on_after_delete
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use resource_query::CompiledFilter;
use resource_store::{cache_key, Record, ResourceSchema, Store, StoreResult};

use crate::cache::{Cache, CacheError, CacheResult};

/// Default budget for a single cache round trip.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(250);

/// Value left under the key of a deleted record.
const TOMBSTONE: &str = "null";

/// What a cache lookup found.
enum Cached {
    Record(Box<Record>),
    Tombstone,
    Corrupt,
    Absent,
}

fn encode(key: &str, record: &Record) -> Option<String> {
    match serde_json::to_string(record) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Failed to serialize record for cache");
            None
        }
    }
}

/// Cache-aside coordinator.
#[derive(Clone)]
pub struct CacheAside {
    cache: Option<Arc<dyn Cache>>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for CacheAside {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAside")
            .field("enabled", &self.cache.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for CacheAside {
    fn default() -> Self {
        Self::disabled()
    }
}

impl CacheAside {
    /// Coordinate through `cache`.
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache: Some(cache),
            timeout: Some(DEFAULT_CACHE_TIMEOUT),
        }
    }

    /// A pass-through coordinator with no cache.
    pub fn disabled() -> Self {
        Self {
            cache: None,
            timeout: Some(DEFAULT_CACHE_TIMEOUT),
        }
    }

    /// Set the per-call budget. A zero duration disables the budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Whether a cache is configured.
    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Fetch one record, consulting the cache first.
    ///
    /// On a miss (or any cache failure) the store is queried and, if the
    /// record exists, written back to the cache. The write-back only fills an
    /// empty key, so it never replaces what a concurrent write or delete put
    /// there in the meantime. Store errors propagate.
    pub async fn fetch_one(
        &self,
        store: &dyn Store,
        schema: &ResourceSchema,
        id: &str,
    ) -> StoreResult<Record> {
        let key = cache_key(&schema.kind, id);
        let cached = self.lookup(&key).await;
        if let Cached::Record(record) = cached {
            tracing::trace!(key = %key, "Cache hit");
            return Ok(*record);
        }

        let record = store.find_one(schema, id).await?;
        if matches!(cached, Cached::Corrupt) {
            self.put(&key, &record).await;
        } else {
            self.fill(&key, &record).await;
        }
        Ok(record)
    }

    /// Fill the cache with records returned by a filtered query.
    ///
    /// Records carrying eager-loaded relations are not cached, since the
    /// cached form of a record never includes its relations.
    pub async fn on_fetched(&self, schema: &ResourceSchema, filter: &CompiledFilter, records: &[Record]) {
        if self.cache.is_none() || !filter.include.is_empty() {
            return;
        }
        for record in records {
            self.fill(&record.cache_key(&schema.kind), record).await;
        }
    }

    /// Refresh the cache after a committed create or update.
    ///
    /// On revisioned kinds an entry already holding a later revision is kept,
    /// so a slow refresh cannot roll the cache back.
    pub async fn on_create_or_update(&self, schema: &ResourceSchema, record: &Record) {
        if self.cache.is_none() {
            return;
        }
        let key = record.cache_key(&schema.kind);
        if schema.revisioned {
            if let Cached::Record(cached) = self.lookup(&key).await {
                if cached.revision > record.revision {
                    tracing::debug!(
                        key = %key,
                        cached = cached.revision,
                        committed = record.revision,
                        "Keeping newer cache entry"
                    );
                    return;
                }
            }
        }
        self.put(&key, record).await;
    }

    /// Evict a record before it is deleted from the store.
    ///
    /// The record is reloaded from the store so the evicted key matches the
    /// stored row; the reloaded record is returned. A missing row surfaces as
    /// the store's not-found error. The entry is replaced by a tombstone that
    /// reads as a miss and blocks read-path write-backs until it expires.
    pub async fn on_before_delete(
        &self,
        store: &dyn Store,
        schema: &ResourceSchema,
        record: &Record,
    ) -> StoreResult<Record> {
        let current = store.find_one(schema, &record.id).await?;
        self.bury(&current.cache_key(&schema.kind)).await;
        Ok(current)
    }

    /// Evict again once the delete has committed, covering any write-back
    /// that raced the first eviction.
    pub async fn on_after_delete(&self, schema: &ResourceSchema, id: &str) {
        self.bury(&cache_key(&schema.kind, id)).await;
    }

    /// Whether the cache currently holds a record for `kind`/`id`.
    pub async fn contains(&self, kind: &str, id: &str) -> bool {
        matches!(self.lookup(&cache_key(kind, id)).await, Cached::Record(_))
    }

    /// Close the underlying cache.
    pub async fn close(&self) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.close().await {
                tracing::warn!(error = %e, "Failed to close cache");
            }
        }
    }

    async fn lookup(&self, key: &str) -> Cached {
        let Some(cache) = &self.cache else {
            return Cached::Absent;
        };
        match self.guarded("get", key, cache.get(key)).await {
            Some(Some(value)) if value == TOMBSTONE => Cached::Tombstone,
            Some(Some(value)) => match serde_json::from_str::<Record>(&value) {
                Ok(record) => Cached::Record(Box::new(record)),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    Cached::Corrupt
                }
            },
            _ => Cached::Absent,
        }
    }

    /// Unconditionally write a committed record.
    async fn put(&self, key: &str, record: &Record) {
        let Some(cache) = &self.cache else {
            return;
        };
        let Some(value) = encode(key, record) else {
            return;
        };
        if self.guarded("set", key, cache.set(key, value)).await.is_some() {
            tracing::debug!(key = %key, "Refreshed cache entry");
        }
    }

    /// Write a record read from the store only if the key is empty.
    async fn fill(&self, key: &str, record: &Record) {
        let Some(cache) = &self.cache else {
            return;
        };
        let Some(value) = encode(key, record) else {
            return;
        };
        match self.guarded("set_if_absent", key, cache.set_if_absent(key, value)).await {
            Some(true) => tracing::debug!(key = %key, "Filled cache entry"),
            Some(false) => tracing::trace!(key = %key, "Cache entry already present"),
            None => {}
        }
    }

    async fn bury(&self, key: &str) {
        let Some(cache) = &self.cache else {
            return;
        };
        if self
            .guarded("set", key, cache.set(key, TOMBSTONE.to_string()))
            .await
            .is_some()
        {
            tracing::debug!(key = %key, "Evicted cache entry");
        }
    }

    /// Run a cache call under the time budget. Failures are logged and
    /// reported as `None`.
    async fn guarded<T>(
        &self,
        op: &'static str,
        key: &str,
        call: impl Future<Output = CacheResult<T>>,
    ) -> Option<T> {
        let outcome = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, call).await {
                Ok(outcome) => outcome,
                Err(_) => Err(CacheError::Timeout),
            },
            None => call.await,
        };

        match outcome {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(op = op, key = %key, error = %e, "Cache call failed");
                None
            }
        }
    }
}
