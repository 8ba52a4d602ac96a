//! In-memory store implementation.
//!
//! Suitable for single-process deployments and tests. Rows keep insertion
//! order, and filters are evaluated with the same predicate the SQL renderer
//! uses, so results match what a relational backend would return.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use resource_acl::Revisioned;
use resource_query::{compare_values, CompiledFilter, Direction, OrderBy};

use crate::error::{StoreError, StoreResult};
use crate::record::Record;
use crate::schema::{Relation, ResourceSchema};
use crate::store::Store;

/// Store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Single-record lookups
    pub find_one_calls: u64,
    /// Filtered lookups
    pub find_many_calls: u64,
    /// Creates, updates and deletes that committed
    pub writes: u64,
}

/// In-memory store keyed by kind.
pub struct MemoryStore {
    /// Rows per kind, in insertion order
    tables: Arc<RwLock<HashMap<String, Vec<Record>>>>,
    find_one_calls: AtomicU64,
    find_many_calls: AtomicU64,
    writes: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("stats", &self.stats())
            .finish()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            find_one_calls: AtomicU64::new(0),
            find_many_calls: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            find_one_calls: self.find_one_calls.load(Ordering::Relaxed),
            find_many_calls: self.find_many_calls.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }

    /// Number of rows stored for a kind.
    pub async fn len(&self, kind: &str) -> usize {
        self.tables.read().await.get(kind).map_or(0, Vec::len)
    }

    fn eager_load(
        tables: &HashMap<String, Vec<Record>>,
        relation: &Relation,
        parent: &mut Record,
    ) -> StoreResult<()> {
        let parent_id = Value::String(parent.id.clone());
        let children = tables
            .get(&relation.kind)
            .map(|rows| {
                rows.iter()
                    .filter(|child| {
                        child
                            .get(&relation.foreign_key)
                            .and_then(|fk| compare_values(fk, &parent_id))
                            == Some(CmpOrdering::Equal)
                    })
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .unwrap_or_default();

        parent.fields.insert(relation.name.clone(), Value::Array(children));
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare two rows by a list of order terms. Missing and null values sort
/// first in ascending order.
fn compare_rows(a: &Map<String, Value>, b: &Map<String, Value>, order: &[OrderBy]) -> CmpOrdering {
    for term in order {
        let left = a.get(&term.column).filter(|v| !v.is_null());
        let right = b.get(&term.column).filter(|v| !v.is_null());
        let ordering = match (left, right) {
            (None, None) => CmpOrdering::Equal,
            (None, Some(_)) => CmpOrdering::Less,
            (Some(_), None) => CmpOrdering::Greater,
            (Some(l), Some(r)) => compare_values(l, r).unwrap_or(CmpOrdering::Equal),
        };
        let ordering = match term.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != CmpOrdering::Equal {
            return ordering;
        }
    }
    CmpOrdering::Equal
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_many(
        &self,
        schema: &ResourceSchema,
        filter: &CompiledFilter,
    ) -> StoreResult<Vec<Record>> {
        self.find_many_calls.fetch_add(1, Ordering::Relaxed);

        let relations = filter
            .include
            .iter()
            .map(|name| {
                schema
                    .relation(name)
                    .ok_or_else(|| StoreError::UnknownRelation(name.clone()))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let tables = self.tables.read().await;
        let rows = tables.get(&schema.kind).map(Vec::as_slice).unwrap_or(&[]);

        let mut matched: Vec<(Map<String, Value>, &Record)> = rows
            .iter()
            .map(|record| (record.row(schema), record))
            .filter(|(row, _)| filter.predicate.matches(row))
            .collect();

        if !filter.order.is_empty() {
            matched.sort_by(|(a, _), (b, _)| compare_rows(a, b, &filter.order));
        }

        let mut records: Vec<Record> = matched
            .into_iter()
            .skip(filter.skip.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .map(|(_, record)| record.clone())
            .collect();

        for relation in relations {
            for record in &mut records {
                Self::eager_load(&tables, relation, record)?;
            }
        }

        tracing::trace!(kind = %schema.kind, count = records.len(), "Found records");
        Ok(records)
    }

    async fn find_one(&self, schema: &ResourceSchema, id: &str) -> StoreResult<Record> {
        self.find_one_calls.fetch_add(1, Ordering::Relaxed);

        let tables = self.tables.read().await;
        tables
            .get(&schema.kind)
            .and_then(|rows| rows.iter().find(|r| r.id == id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(&schema.kind, id))
    }

    async fn create(&self, schema: &ResourceSchema, mut record: Record) -> StoreResult<Record> {
        if record.id.is_empty() {
            record.id = uuid::Uuid::now_v7().to_string();
        }
        record.fields = schema.retain_columns(std::mem::take(&mut record.fields));
        record.revision = 0;
        if schema.revisioned {
            record.set_next_revision();
        }

        let mut tables = self.tables.write().await;
        let rows = tables.entry(schema.kind.clone()).or_default();
        if rows.iter().any(|r| r.id == record.id) {
            return Err(StoreError::Duplicate {
                kind: schema.kind.clone(),
                id: record.id,
            });
        }
        rows.push(record.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(kind = %schema.kind, id = %record.id, "Created record");
        Ok(record)
    }

    async fn update(
        &self,
        schema: &ResourceSchema,
        record: Record,
        expected_revision: Option<i64>,
    ) -> StoreResult<Record> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .get_mut(&schema.kind)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == record.id))
            .ok_or_else(|| StoreError::not_found(&schema.kind, &record.id))?;

        if let Some(expected) = expected_revision {
            if stored.revision != expected {
                return Err(StoreError::RevisionMismatch {
                    current: Box::new(stored.clone()),
                });
            }
        }

        for (key, value) in schema.retain_columns(record.fields) {
            if !value.is_null() {
                stored.fields.insert(key, value);
            }
        }
        if let Some(permission) = record.permission {
            stored.permission = Some(permission);
        }
        if schema.revisioned {
            stored.set_next_revision();
        }
        self.writes.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            kind = %schema.kind,
            id = %stored.id,
            revision = stored.revision,
            "Updated record"
        );
        Ok(stored.clone())
    }

    async fn delete(&self, schema: &ResourceSchema, id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(&schema.kind)
            .ok_or_else(|| StoreError::not_found(&schema.kind, id))?;
        let position = rows
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StoreError::not_found(&schema.kind, id))?;
        rows.remove(position);
        self.writes.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(kind = %schema.kind, id = %id, "Deleted record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_query::{compile, Query};
    use serde_json::json;

    fn users() -> ResourceSchema {
        ResourceSchema::new("users")
            .with_columns(["name", "age"])
            .with_revisions()
            .with_relation(Relation::has_many("articles", "articles", "author_id"))
    }

    fn articles() -> ResourceSchema {
        ResourceSchema::new("articles").with_columns(["title", "author_id"])
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let schema = users();
        for (id, name, age) in [("1", "Thomas", 28), ("2", "Alan", 30), ("3", "Jason", 22), ("4", "Ben", 40)] {
            store
                .create(&schema, Record::new(id).with_field("name", name).with_field("age", age))
                .await
                .unwrap();
        }
        store
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_str))
            .collect()
    }

    #[tokio::test]
    async fn test_find_many_mixed_and_or() {
        let store = seeded().await;
        let filter = Query::new()
            .filter("name")
            .equals("Thomas")
            .or("name")
            .equals("Alan")
            .and("age")
            .sup(29)
            .compile(&users())
            .unwrap();

        let found = store.find_many(&users(), &filter).await.unwrap();
        assert_eq!(names(&found), vec!["Alan"]);
    }

    #[tokio::test]
    async fn test_find_many_order_skip_limit() {
        let store = seeded().await;
        let filter = Query::new()
            .order("age", Direction::Desc, false)
            .skip(1)
            .limit(2)
            .compile(&users())
            .unwrap();

        let found = store.find_many(&users(), &filter).await.unwrap();
        assert_eq!(names(&found), vec!["Alan", "Thomas"]);
    }

    #[tokio::test]
    async fn test_find_many_empty_filter_keeps_insertion_order() {
        let store = seeded().await;
        let found = store.find_many(&users(), &CompiledFilter::default()).await.unwrap();
        assert_eq!(names(&found), vec!["Thomas", "Alan", "Jason", "Ben"]);
    }

    #[tokio::test]
    async fn test_find_many_filters_on_id_and_revision() {
        let store = seeded().await;
        let filter = Query::new()
            .filter("id")
            .in_values(["2", "4"])
            .and("revision")
            .equals(1)
            .compile(&users())
            .unwrap();
        let found = store.find_many(&users(), &filter).await.unwrap();
        assert_eq!(names(&found), vec!["Alan", "Ben"]);
    }

    #[tokio::test]
    async fn test_find_many_eager_loads_relation() {
        let store = seeded().await;
        store
            .create(&articles(), Record::new("a1").with_field("title", "Hello").with_field("author_id", 2))
            .await
            .unwrap();
        store
            .create(&articles(), Record::new("a2").with_field("title", "Other").with_field("author_id", "3"))
            .await
            .unwrap();

        let filter = Query::new()
            .filter("name")
            .equals("Alan")
            .include(["articles"])
            .compile(&users())
            .unwrap();
        let found = store.find_many(&users(), &filter).await.unwrap();
        assert_eq!(
            found[0].get("articles"),
            Some(&json!([{"id": "a1", "title": "Hello", "author_id": 2}]))
        );
    }

    #[tokio::test]
    async fn test_find_many_unknown_relation() {
        let store = seeded().await;
        let mut filter = CompiledFilter::default();
        filter.include.push("comments".into());
        let err = store.find_many(&users(), &filter).await.unwrap_err();
        assert_eq!(err, StoreError::UnknownRelation("comments".into()));
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_first_revision() {
        let store = MemoryStore::new();
        let created = store
            .create(&users(), Record::default().with_field("name", "Ada").with_field("salary", 1))
            .await
            .unwrap();
        assert!(!created.id.is_empty());
        assert_eq!(created.revision, 1);
        assert!(created.get("salary").is_none());

        let plain = store.create(&articles(), Record::default()).await.unwrap();
        assert_eq!(plain.revision, 0);
    }

    #[tokio::test]
    async fn test_create_duplicate() {
        let store = seeded().await;
        let err = store.create(&users(), Record::new("1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_update_conditional_on_revision() {
        let store = seeded().await;
        let patch = Record::new("2").with_field("age", 31).with_field("name", Value::Null);

        let updated = store.update(&users(), patch.clone(), Some(1)).await.unwrap();
        assert_eq!(updated.revision, 2);
        assert_eq!(updated.get("age"), Some(&json!(31)));
        assert_eq!(updated.get("name"), Some(&json!("Alan")));

        let err = store.update(&users(), patch, Some(1)).await.unwrap_err();
        match err {
            StoreError::RevisionMismatch { current } => assert_eq!(current.revision, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_stale_updates_commit_once() {
        let store = Arc::new(seeded().await);
        let mut handles = Vec::new();
        for age in 50..58 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(&users(), Record::new("1").with_field("age", age), Some(1))
                    .await
            }));
        }

        let mut committed = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                committed += 1;
            }
        }
        assert_eq!(committed, 1);
        assert_eq!(store.find_one(&users(), "1").await.unwrap().revision, 2);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let store = MemoryStore::new();
        assert!(store.update(&users(), Record::new("x"), None).await.unwrap_err().is_not_found());
        assert!(store.delete(&users(), "x").await.unwrap_err().is_not_found());
        assert!(store.find_one(&users(), "x").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_and_stats() {
        let store = seeded().await;
        store.delete(&users(), "3").await.unwrap();
        assert_eq!(store.len("users").await, 3);
        let _ = store.find_one(&users(), "1").await;

        let stats = store.stats();
        assert_eq!(stats.writes, 5);
        assert_eq!(stats.find_one_calls, 1);
        assert_eq!(stats.find_many_calls, 0);
    }

    #[tokio::test]
    async fn test_structured_filter_like_and_ordering_nulls_first() {
        let store = seeded().await;
        store.create(&users(), Record::new("5").with_field("name", "Thea")).await.unwrap();

        let expr = resource_query::FilterExpression::from_json(
            r#"{"where":[{"key":"name","op":"like","val":"th%"}],"order":{"age":false}}"#,
        )
        .unwrap();
        let filter = compile(&expr, &users()).unwrap();
        let found = store.find_many(&users(), &filter).await.unwrap();
        assert_eq!(names(&found), vec!["Thea", "Thomas"]);
    }
}
