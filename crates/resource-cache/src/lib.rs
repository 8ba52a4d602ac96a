//! # Resource Cache
//!
//! Cache-aside consistency for the resource layer.
//!
//! ## Overview
//!
//! The resource-cache crate handles:
//! - **Cache capability**: [`Cache`] with `get`, `set`, `set_if_absent`, `delete`, `exists`
//!   and `close` over opaque string values
//! - **Backends**: [`MemoryCache`] in-process, `RedisCache` shared
//! - **Coordination**: [`CacheAside`] keeps entries in step with committed
//!   store state and never lets a cache failure fail an operation
//!
//! ## Features
//!
//! - `redis`: Redis-backed cache via a connection manager
//!
//! ## Keys
//!
//! Entries are keyed `"<kind>:<id>"` and hold the record's JSON form:
//!
//! ```text
//! users:42  ->  {"id":"42","name":"Alan","age":30,"revision":3}
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use resource_cache::{CacheAside, MemoryCache};
//! use resource_store::{MemoryStore, Record, ResourceSchema, Store};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let users = ResourceSchema::new("users").with_columns(["name"]);
//! let store = MemoryStore::new();
//! store.create(&users, Record::new("42").with_field("name", "Alan")).await.unwrap();
//!
//! let coordinator = CacheAside::new(Arc::new(MemoryCache::new()));
//! coordinator.fetch_one(&store, &users, "42").await.unwrap();
//! assert!(coordinator.contains("users", "42").await);
//! # }
//! ```

pub mod cache;
pub mod coordinator;

#[cfg(feature = "redis")]
pub mod redis;

// Re-export main types
pub use cache::{Cache, CacheError, CacheResult, CacheStats, MemoryCache, DEFAULT_ENTRY_TTL};
pub use coordinator::{CacheAside, DEFAULT_CACHE_TIMEOUT};
pub use resource_store::cache_key;

#[cfg(feature = "redis")]
pub use self::redis::{RedisCache, RedisCacheConfig};
