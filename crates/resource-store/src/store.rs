//! Backing store capability.

use async_trait::async_trait;
use std::sync::Arc;

use resource_query::CompiledFilter;

use crate::error::StoreResult;
use crate::record::Record;
use crate::schema::ResourceSchema;

/// Primary store for resource records.
///
/// Implementations are the sole source of truth. `update` must enforce the
/// expected revision atomically with the write so that two updates carrying
/// the same stale revision cannot both succeed.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch records matching a compiled filter.
    ///
    /// The predicate is applied first, then ordering, skip, limit and finally
    /// eager-loading of `include` relations.
    async fn find_many(
        &self,
        schema: &ResourceSchema,
        filter: &CompiledFilter,
    ) -> StoreResult<Vec<Record>>;

    /// Fetch one record by id.
    async fn find_one(&self, schema: &ResourceSchema, id: &str) -> StoreResult<Record>;

    /// Insert a record, assigning an id when it has none.
    ///
    /// Revisioned kinds commit the record at revision 1.
    async fn create(&self, schema: &ResourceSchema, record: Record) -> StoreResult<Record>;

    /// Merge `record` into the stored row with the same id.
    ///
    /// When `expected_revision` is set the write only happens if the stored
    /// revision still equals it; otherwise `RevisionMismatch` carries the
    /// stored row. On revisioned kinds a successful write advances the
    /// revision by one. Null fields leave stored values untouched.
    async fn update(
        &self,
        schema: &ResourceSchema,
        record: Record,
        expected_revision: Option<i64>,
    ) -> StoreResult<Record>;

    /// Delete a record by id.
    async fn delete(&self, schema: &ResourceSchema, id: &str) -> StoreResult<()>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn find_many(
        &self,
        schema: &ResourceSchema,
        filter: &CompiledFilter,
    ) -> StoreResult<Vec<Record>> {
        (**self).find_many(schema, filter).await
    }

    async fn find_one(&self, schema: &ResourceSchema, id: &str) -> StoreResult<Record> {
        (**self).find_one(schema, id).await
    }

    async fn create(&self, schema: &ResourceSchema, record: Record) -> StoreResult<Record> {
        (**self).create(schema, record).await
    }

    async fn update(
        &self,
        schema: &ResourceSchema,
        record: Record,
        expected_revision: Option<i64>,
    ) -> StoreResult<Record> {
        (**self).update(schema, record, expected_revision).await
    }

    async fn delete(&self, schema: &ResourceSchema, id: &str) -> StoreResult<()> {
        (**self).delete(schema, id).await
    }
}
