//! # Resource Store
//!
//! The backing store capability consumed by the resource layer, the schema
//! each kind declares, and an in-memory implementation.
//!
//! ## Overview
//!
//! - **Schemas**: [`ResourceSchema`] lists a kind's columns, revision support,
//!   default permission and eager-loadable relations
//! - **Records**: [`Record`] is a resource instance with flattened data fields
//! - **Stores**: the [`Store`] trait, with [`MemoryStore`] for single-process
//!   use and tests
//!
//! ## Usage
//!
//! ```rust
//! use resource_query::Query;
//! use resource_store::{MemoryStore, Record, ResourceSchema, Store};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let users = ResourceSchema::new("users").with_columns(["name", "age"]).with_revisions();
//! let store = MemoryStore::new();
//!
//! let created = store
//!     .create(&users, Record::default().with_field("name", "Alan").with_field("age", 30))
//!     .await
//!     .unwrap();
//! assert_eq!(created.revision, 1);
//!
//! let filter = Query::new().filter("age").sup(29).compile(&users).unwrap();
//! let found = store.find_many(&users, &filter).await.unwrap();
//! assert_eq!(found.len(), 1);
//! # }
//! ```

pub mod error;
#[cfg(feature = "memory")]
pub mod memory;
pub mod record;
pub mod schema;
pub mod store;

// Re-export main types for convenience
pub use error::{StoreError, StoreResult};
#[cfg(feature = "memory")]
pub use memory::{MemoryStore, StoreStats};
pub use record::{cache_key, Record};
pub use schema::{Relation, ResourceSchema, REVISION_COLUMN};
pub use store::Store;
