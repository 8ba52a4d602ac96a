//! # Resource Layer
//!
//! Registry and dispatch for generic resource kinds, tying together filter
//! compilation, permission evaluation and cache-aside coherence.
//!
//! ## Overview
//!
//! The resource-layer crate handles:
//! - **Registry**: Which kinds exist and which operations each enables
//! - **Context**: The store, cache and configuration shared by every request
//! - **Dispatch**: Read, create, update, delete and query in a fixed order
//! - **Errors**: One taxonomy with HTTP status codes and stable error codes
//!
//! ## Architecture
//!
//! ```text
//! Request ─► Registry (policy) ─► Filter compiler / key lookup
//!                                   │
//!                                   ▼
//!                         Cache-aside ─► Store
//!                                   │
//!                                   ▼
//!                         Permission evaluator ─► Response
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use resource_acl::{AccessPolicy, Principal};
//! use resource_cache::MemoryCache;
//! use resource_layer::{Dispatcher, LayerContext, Request, RequestContext, ResourceRegistry};
//! use resource_store::{MemoryStore, ResourceSchema};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = ResourceRegistry::builder()
//!     .register(
//!         ResourceSchema::new("users").with_columns(["name", "age"]).with_revisions(),
//!         AccessPolicy::all(),
//!     )
//!     .build();
//! let ctx = LayerContext::new(Arc::new(MemoryStore::new()), registry)
//!     .with_cache(Arc::new(MemoryCache::new()));
//! let dispatcher = Dispatcher::new(ctx);
//! let rc = RequestContext::for_identity(Arc::new(Principal::user("1")));
//!
//! let created = dispatcher
//!     .handle(&rc, Request::create("users", json!({"id": "7", "name": "Alan", "age": 30})))
//!     .await;
//! assert_eq!(created.status, 200);
//! assert_eq!(created.body["revision"], 1);
//!
//! let found = dispatcher
//!     .handle(&rc, Request::query("users", json!({"where": [{"key": "age", "op": ">", "val": 29}]})))
//!     .await;
//! assert_eq!(found.body.as_array().map(Vec::len), Some(1));
//! # }
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod registry;

// Re-export main types for convenience
pub use config::{ConfigError, LayerConfig};
pub use context::LayerContext;
pub use dispatch::{Dispatcher, Request, RequestContext, Response};
pub use error::{LayerError, LayerResult};
pub use registry::{RegistryBuilder, ResourceDescriptor, ResourceRegistry};
