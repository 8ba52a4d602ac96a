//! End-to-end tests for resource dispatch.
//!
//! These tests drive the dispatcher over the in-memory store and cache and
//! verify the ordering guarantees between policy checks, filter compilation,
//! permission evaluation, revision checks and cache refresh.
//!
//! Registered kinds:
//! 1. users: revisioned, unrestricted, every operation enabled
//! 2. secrets: revisioned, admin-only by default
//! 3. audit: read-only policy
//! 4. teams: unrevisioned, with a `members` relation onto users

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use resource_acl::{AccessPolicy, Permission, Principal};
use resource_cache::{Cache, CacheError, CacheResult, CacheStats, MemoryCache};
use resource_layer::{
    Dispatcher, LayerConfig, LayerContext, Request, RequestContext, ResourceRegistry,
};
use resource_query::{CompiledFilter, Direction, Query};
use resource_store::{MemoryStore, Record, Relation, ResourceSchema, Store, StoreResult};

/// Test fixture wiring a dispatcher over shared in-memory collaborators.
struct TestFixture {
    /// Store shared with the dispatcher, kept to read call counts.
    store: Arc<MemoryStore>,
    /// Dispatcher under test.
    dispatcher: Dispatcher,
}

impl TestFixture {
    /// Fixture with a memory cache attached.
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let ctx = LayerContext::new(store.clone(), registry()).with_cache(Arc::new(MemoryCache::new()));
        Self {
            store,
            dispatcher: Dispatcher::new(ctx),
        }
    }

    /// Fixture whose cache fails every call.
    fn with_failing_cache() -> Self {
        let store = Arc::new(MemoryStore::new());
        let ctx = LayerContext::new(store.clone(), registry()).with_cache(Arc::new(FailingCache));
        Self {
            store,
            dispatcher: Dispatcher::new(ctx),
        }
    }

    async fn seed_users(&self) {
        let admin = admin();
        for (id, name, age) in [("1", "Thomas", 28), ("2", "Alan", 30), ("3", "Jason", 22), ("4", "Ben", 40)] {
            let response = self
                .dispatcher
                .handle(&admin, Request::create("users", json!({"id": id, "name": name, "age": age})))
                .await;
            assert_eq!(response.status, 200, "{}", response.body);
        }
    }
}

fn registry() -> Arc<ResourceRegistry> {
    ResourceRegistry::builder()
        .register(
            ResourceSchema::new("users")
                .with_columns(["name", "age", "team_id"])
                .with_revisions(),
            AccessPolicy::all(),
        )
        .register(
            ResourceSchema::new("secrets")
                .with_columns(["value"])
                .with_revisions()
                .with_default_permission(Permission::restricted_to(["admin"])),
            AccessPolicy::all(),
        )
        .register(
            ResourceSchema::new("audit").with_columns(["event"]),
            AccessPolicy::read_only().with(resource_acl::Operation::Create, true),
        )
        .register(
            ResourceSchema::new("teams")
                .with_columns(["title"])
                .with_relation(Relation::has_many("members", "users", "team_id")),
            AccessPolicy::all(),
        )
        .build()
}

fn admin() -> RequestContext {
    RequestContext::for_identity(Arc::new(Principal::user("root").with_role("admin")))
}

fn user(id: &str) -> RequestContext {
    RequestContext::for_identity(Arc::new(Principal::user(id)))
}

fn names(body: &Value) -> Vec<&str> {
    body.as_array()
        .map(|items| items.iter().filter_map(|r| r["name"].as_str()).collect())
        .unwrap_or_default()
}

// ============================================================================
// Query
// ============================================================================

#[tokio::test]
async fn test_query_or_group_with_trailing_and() {
    let fixture = TestFixture::new();
    fixture.seed_users().await;

    let body = json!({
        "where": [
            {"key": "name", "op": "=", "val": "Thomas", "or": [{"key": "name", "op": "=", "val": "Alan"}]},
            {"key": "age", "op": ">", "val": 29}
        ]
    });
    let response = fixture.dispatcher.handle(&user("1"), Request::query("users", body)).await;

    assert_eq!(response.status, 200);
    assert_eq!(names(&response.body), vec!["Alan"]);
}

#[tokio::test]
async fn test_query_accepts_json_string_body() {
    let fixture = TestFixture::new();
    fixture.seed_users().await;

    let body = Value::String(r#"{"where":[{"key":"age","op":">=","val":30}],"order":{"age":false}}"#.to_string());
    let response = fixture.dispatcher.handle(&user("1"), Request::query("users", body)).await;

    assert_eq!(response.status, 200);
    assert_eq!(names(&response.body), vec!["Alan", "Ben"]);
}

#[tokio::test]
async fn test_object_body_keeps_order_sequence() {
    let fixture = TestFixture::new();
    fixture.seed_users().await;

    let body = json!({"order": {"name": false, "age": false}});
    let response = fixture.dispatcher.handle(&user("1"), Request::query("users", body.clone())).await;
    assert_eq!(response.status, 200);
    assert_eq!(names(&response.body), vec!["Alan", "Ben", "Jason", "Thomas"]);

    let as_string = Value::String(body.to_string());
    let same = fixture.dispatcher.handle(&user("1"), Request::query("users", as_string)).await;
    assert_eq!(same.body, response.body);
}

#[tokio::test]
async fn test_builder_query_through_dispatcher() {
    let fixture = TestFixture::new();
    fixture.seed_users().await;

    let query = Query::new()
        .filter("age")
        .sup(20)
        .order("age", Direction::Desc, false)
        .limit(2);
    let records = fixture
        .dispatcher
        .query(&user("1"), "users", query.expression().unwrap())
        .await
        .unwrap();

    let names: Vec<_> = records.iter().filter_map(|r| r.get("name")?.as_str()).collect();
    assert_eq!(names, vec!["Ben", "Alan"]);
}

#[tokio::test]
async fn test_invalid_filter_never_reaches_store() {
    let fixture = TestFixture::new();

    let bad_operator = json!({"where": [{"key": "age", "op": "~", "val": 1}]});
    let response = fixture.dispatcher.handle(&user("1"), Request::query("users", bad_operator)).await;
    assert_eq!(response.status, 400);
    assert_eq!(response.body["code"], "INVALID_OPERATOR");

    let unknown_column = json!({"where": [{"key": "salary", "op": ">", "val": 1}]});
    let response = fixture.dispatcher.handle(&user("1"), Request::query("users", unknown_column)).await;
    assert_eq!(response.status, 400);
    assert_eq!(response.body["code"], "UNKNOWN_COLUMN");

    let malformed = Value::String("{not json".to_string());
    let response = fixture.dispatcher.handle(&user("1"), Request::query("users", malformed)).await;
    assert_eq!(response.status, 400);

    assert_eq!(fixture.store.stats().find_many_calls, 0);
}

#[tokio::test]
async fn test_query_drops_unreadable_records() {
    let fixture = TestFixture::new();
    fixture.seed_users().await;

    // Ben becomes admin-only.
    let response = fixture
        .dispatcher
        .handle(
            &admin(),
            Request::update("users", "4", json!({"revision": 1, "permission": {"read": ["admin"], "write": ["admin"]}})),
        )
        .await;
    assert_eq!(response.status, 200, "{}", response.body);

    let everyone = json!({"where": [{"key": "age", "op": ">", "val": 29}]});
    let response = fixture.dispatcher.handle(&user("1"), Request::query("users", everyone.clone())).await;
    assert_eq!(response.status, 200);
    assert_eq!(names(&response.body), vec!["Alan"]);

    let response = fixture.dispatcher.handle(&admin(), Request::query("users", everyone)).await;
    assert_eq!(names(&response.body), vec!["Alan", "Ben"]);
}

#[tokio::test]
async fn test_query_includes_relations() {
    let fixture = TestFixture::new();
    let admin = admin();
    fixture
        .dispatcher
        .create(&admin, "teams", json!({"id": "t1", "title": "Core"}))
        .await
        .unwrap();
    fixture
        .dispatcher
        .create(&admin, "users", json!({"id": "1", "name": "Thomas", "team_id": "t1"}))
        .await
        .unwrap();

    let response = fixture
        .dispatcher
        .handle(&admin, Request::query("teams", json!({"include": ["members"]})))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body[0]["members"][0]["name"], "Thomas");

    let response = fixture
        .dispatcher
        .handle(&admin, Request::query("teams", json!({"include": ["owners"]})))
        .await;
    assert_eq!(response.status, 400);
}

// ============================================================================
// Revisions
// ============================================================================

#[tokio::test]
async fn test_update_advances_revision_and_replay_conflicts() {
    let fixture = TestFixture::new();
    fixture.seed_users().await;
    let rc = user("1");

    let payload = json!({"name": "Alan Turing", "revision": 1});
    let response = fixture.dispatcher.handle(&rc, Request::update("users", "2", payload.clone())).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["revision"], 2);
    assert_eq!(response.body["name"], "Alan Turing");
    assert_eq!(response.body["age"], 30);

    let response = fixture.dispatcher.handle(&rc, Request::update("users", "2", payload)).await;
    assert_eq!(response.status, 409);
    assert_eq!(response.body["message"], "conflict");
    assert_eq!(response.body["code"], "REVISION_CONFLICT");
    assert_eq!(response.body["data"]["revision"], 2);
    assert_eq!(response.body["data"]["name"], "Alan Turing");
}

#[tokio::test]
async fn test_update_without_revision_is_rejected() {
    let fixture = TestFixture::new();
    fixture.seed_users().await;

    let response = fixture
        .dispatcher
        .handle(&user("1"), Request::update("users", "2", json!({"name": "Al"})))
        .await;
    assert_eq!(response.status, 409);
    assert_eq!(response.body["code"], "REVISION_REQUIRED");
    assert!(response.body.get("data").is_none());

    let stored = fixture.dispatcher.read(&user("1"), "users", "2").await.unwrap();
    assert_eq!(stored.get("name"), Some(&json!("Alan")));
    assert_eq!(stored.revision, 1);
}

#[tokio::test]
async fn test_unrevisioned_kind_ignores_revision() {
    let fixture = TestFixture::new();
    let rc = admin();
    fixture
        .dispatcher
        .create(&rc, "teams", json!({"id": "t1", "title": "Core"}))
        .await
        .unwrap();

    let updated = fixture
        .dispatcher
        .update(&rc, "teams", "t1", json!({"title": "Platform"}))
        .await
        .unwrap();
    assert_eq!(updated.get("title"), Some(&json!("Platform")));
    assert_eq!(updated.revision, 0);
}

#[tokio::test]
async fn test_concurrent_stale_updates_commit_once() {
    let fixture = TestFixture::new();
    fixture.seed_users().await;

    let a = fixture.dispatcher.clone();
    let b = fixture.dispatcher.clone();
    let (first, second) = tokio::join!(
        async move { a.handle(&user("1"), Request::update("users", "1", json!({"age": 29, "revision": 1}))).await },
        async move { b.handle(&user("2"), Request::update("users", "1", json!({"age": 31, "revision": 1}))).await },
    );

    let mut statuses = vec![first.status, second.status];
    statuses.sort_unstable();
    assert_eq!(statuses, vec![200, 409]);

    let stored = fixture.dispatcher.read(&admin(), "users", "1").await.unwrap();
    assert_eq!(stored.revision, 2);
}

// ============================================================================
// Permissions
// ============================================================================

#[tokio::test]
async fn test_permission_denied_has_no_data() {
    let fixture = TestFixture::new();
    fixture
        .dispatcher
        .create(&admin(), "secrets", json!({"id": "s1", "value": "42"}))
        .await
        .unwrap();

    let response = fixture.dispatcher.handle(&user("1"), Request::read("secrets", "s1")).await;
    assert_eq!(response.status, 403);
    assert_eq!(response.body["code"], "FORBIDDEN");
    assert!(response.body.get("data").is_none());

    // A stale revision from a caller without write access reports 403, not 409.
    let response = fixture
        .dispatcher
        .handle(&user("1"), Request::update("secrets", "s1", json!({"value": "0", "revision": 7})))
        .await;
    assert_eq!(response.status, 403);
    assert!(response.body.get("data").is_none());

    let response = fixture.dispatcher.handle(&admin(), Request::read("secrets", "s1")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["value"], "42");
}

#[tokio::test]
async fn test_anonymous_denied_on_restricted_kind() {
    let fixture = TestFixture::new();
    fixture
        .dispatcher
        .create(&admin(), "secrets", json!({"id": "s1", "value": "42"}))
        .await
        .unwrap();

    let anonymous = RequestContext::anonymous();
    let response = fixture.dispatcher.handle(&anonymous, Request::read("secrets", "s1")).await;
    assert_eq!(response.status, 403);

    let response = fixture
        .dispatcher
        .handle(&anonymous, Request::create("secrets", json!({"value": "1"})))
        .await;
    assert_eq!(response.status, 403);
    assert_eq!(fixture.store.len("secrets").await, 1);

    // Unrestricted kinds stay open to anonymous callers.
    let response = fixture
        .dispatcher
        .handle(&anonymous, Request::create("users", json!({"name": "Guest"})))
        .await;
    assert_eq!(response.status, 200);
    assert!(!response.body["id"].as_str().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_delete_requires_write_permission() {
    let fixture = TestFixture::new();
    fixture
        .dispatcher
        .create(&admin(), "secrets", json!({"id": "s1", "value": "42"}))
        .await
        .unwrap();

    let response = fixture.dispatcher.handle(&user("1"), Request::delete("secrets", "s1")).await;
    assert_eq!(response.status, 403);
    assert_eq!(fixture.store.len("secrets").await, 1);
    assert!(fixture.dispatcher.context().cache.contains("secrets", "s1").await);
}

// ============================================================================
// Registry policy
// ============================================================================

#[tokio::test]
async fn test_disabled_operation_is_rejected() {
    let fixture = TestFixture::new();
    fixture
        .dispatcher
        .create(&admin(), "audit", json!({"id": "a1", "event": "login"}))
        .await
        .unwrap();

    let response = fixture.dispatcher.handle(&admin(), Request::delete("audit", "a1")).await;
    assert_eq!(response.status, 405);
    assert_eq!(response.body["code"], "OPERATION_NOT_ALLOWED");

    let response = fixture.dispatcher.handle(&admin(), Request::query("audit", json!({}))).await;
    assert_eq!(response.status, 405);
    assert_eq!(fixture.store.len("audit").await, 1);
}

#[tokio::test]
async fn test_unknown_kind_and_missing_ids() {
    let fixture = TestFixture::new();

    let response = fixture.dispatcher.handle(&admin(), Request::read("pets", "1")).await;
    assert_eq!(response.status, 404);
    assert_eq!(response.body["code"], "UNKNOWN_KIND");

    let response = fixture.dispatcher.handle(&admin(), Request::read("users", "99")).await;
    assert_eq!(response.status, 404);
    assert_eq!(response.body["code"], "NOT_FOUND");

    let response = fixture.dispatcher.handle(&admin(), Request::read("users", "")).await;
    assert_eq!(response.status, 400);

    let response = fixture
        .dispatcher
        .handle(&admin(), Request::create("users", json!(["not", "an", "object"])))
        .await;
    assert_eq!(response.status, 400);
    assert_eq!(response.body["code"], "BAD_REQUEST");
}

// ============================================================================
// Cache coherence
// ============================================================================

#[tokio::test]
async fn test_update_is_served_from_cache() {
    let fixture = TestFixture::new();
    fixture.seed_users().await;

    fixture
        .dispatcher
        .update(&user("1"), "users", "3", json!({"name": "Jay", "revision": 1}))
        .await
        .unwrap();
    let before = fixture.store.stats().find_one_calls;

    let record = fixture.dispatcher.read(&user("1"), "users", "3").await.unwrap();
    assert_eq!(record.get("name"), Some(&json!("Jay")));
    assert_eq!(record.revision, 2);
    assert_eq!(fixture.store.stats().find_one_calls, before);
}

#[tokio::test]
async fn test_delete_evicts_cache_entry() {
    let fixture = TestFixture::new();
    fixture.seed_users().await;
    let cache = &fixture.dispatcher.context().cache;
    assert!(cache.contains("users", "1").await);

    let response = fixture.dispatcher.handle(&user("1"), Request::delete("users", "1")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["name"], "Thomas");
    assert!(!cache.contains("users", "1").await);

    let response = fixture.dispatcher.handle(&user("1"), Request::read("users", "1")).await;
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn test_read_racing_delete_does_not_resurrect_record() {
    let store = Arc::new(GatedStore::new());
    let seeding = Dispatcher::new(LayerContext::new(store.clone(), registry()));
    let response = seeding
        .handle(&admin(), Request::create("users", json!({"id": "1", "name": "Thomas", "age": 28})))
        .await;
    assert_eq!(response.status, 200);

    // Cold cache: the reader has to go to the store.
    let ctx = LayerContext::new(store.clone(), registry()).with_cache(Arc::new(MemoryCache::new()));
    let dispatcher = Dispatcher::new(ctx);

    store.arm();
    let reader = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.handle(&user("1"), Request::read("users", "1")).await })
    };
    store.reached.notified().await;

    let response = dispatcher.handle(&user("1"), Request::delete("users", "1")).await;
    assert_eq!(response.status, 200);

    store.release.notify_one();
    let stale = reader.await.unwrap();
    assert_eq!(stale.status, 200);

    assert!(!dispatcher.context().cache.contains("users", "1").await);
    let response = dispatcher.handle(&user("1"), Request::read("users", "1")).await;
    assert_eq!(response.status, 404);
    let response = dispatcher.handle(&user("1"), Request::read("users", "1")).await;
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn test_failing_cache_never_fails_operations() {
    let fixture = TestFixture::with_failing_cache();
    fixture.seed_users().await;
    let rc = user("1");

    let record = fixture.dispatcher.read(&rc, "users", "2").await.unwrap();
    assert_eq!(record.get("name"), Some(&json!("Alan")));

    let updated = fixture
        .dispatcher
        .update(&rc, "users", "2", json!({"age": 31, "revision": 1}))
        .await
        .unwrap();
    assert_eq!(updated.revision, 2);

    let deleted = fixture.dispatcher.delete(&rc, "users", "2").await.unwrap();
    assert_eq!(deleted.id, "2");
    assert_eq!(fixture.store.len("users").await, 3);
}

// ============================================================================
// Deadlines
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_request_deadline_expires() {
    let store: Arc<dyn Store> = Arc::new(SlowStore {
        inner: MemoryStore::new(),
        delay: Duration::from_secs(5),
    });
    let dispatcher = Dispatcher::new(LayerContext::new(store, registry()));

    let rc = user("1").with_timeout(Duration::from_millis(100));
    let response = dispatcher.handle(&rc, Request::read("users", "1")).await;
    assert_eq!(response.status, 504);
    assert_eq!(response.body["code"], "DEADLINE_EXCEEDED");
}

#[tokio::test(start_paused = true)]
async fn test_configured_timeout_applies_without_deadline() {
    let store: Arc<dyn Store> = Arc::new(SlowStore {
        inner: MemoryStore::new(),
        delay: Duration::from_secs(5),
    });
    let config = LayerConfig {
        request_timeout_ms: 50,
        ..LayerConfig::default()
    };
    let dispatcher = Dispatcher::new(LayerContext::new(store, registry()).with_config(config));

    let response = dispatcher
        .handle(&user("1"), Request::query("users", json!({})))
        .await;
    assert_eq!(response.status, 504);
}

// ============================================================================
// Test doubles
// ============================================================================

struct FailingCache;

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Err(CacheError::ConnectionError("refused".into()))
    }
    async fn set(&self, _key: &str, _value: String) -> CacheResult<()> {
        Err(CacheError::ConnectionError("refused".into()))
    }
    async fn set_if_absent(&self, _key: &str, _value: String) -> CacheResult<bool> {
        Err(CacheError::ConnectionError("refused".into()))
    }
    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Err(CacheError::ConnectionError("refused".into()))
    }
    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Err(CacheError::ConnectionError("refused".into()))
    }
    async fn close(&self) -> CacheResult<()> {
        Ok(())
    }
    async fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Store that stalls before every call.
struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

#[async_trait]
impl Store for SlowStore {
    async fn find_many(&self, schema: &ResourceSchema, filter: &CompiledFilter) -> StoreResult<Vec<Record>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_many(schema, filter).await
    }

    async fn find_one(&self, schema: &ResourceSchema, id: &str) -> StoreResult<Record> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_one(schema, id).await
    }

    async fn create(&self, schema: &ResourceSchema, record: Record) -> StoreResult<Record> {
        tokio::time::sleep(self.delay).await;
        self.inner.create(schema, record).await
    }

    async fn update(
        &self,
        schema: &ResourceSchema,
        record: Record,
        expected_revision: Option<i64>,
    ) -> StoreResult<Record> {
        tokio::time::sleep(self.delay).await;
        self.inner.update(schema, record, expected_revision).await
    }

    async fn delete(&self, schema: &ResourceSchema, id: &str) -> StoreResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete(schema, id).await
    }
}

/// Store whose next `find_one`, once armed, pauses after reading until
/// released.
struct GatedStore {
    inner: MemoryStore,
    armed: AtomicBool,
    reached: Notify,
    release: Notify,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            armed: AtomicBool::new(false),
            reached: Notify::new(),
            release: Notify::new(),
        }
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for GatedStore {
    async fn find_many(&self, schema: &ResourceSchema, filter: &CompiledFilter) -> StoreResult<Vec<Record>> {
        self.inner.find_many(schema, filter).await
    }

    async fn find_one(&self, schema: &ResourceSchema, id: &str) -> StoreResult<Record> {
        let found = self.inner.find_one(schema, id).await;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        found
    }

    async fn create(&self, schema: &ResourceSchema, record: Record) -> StoreResult<Record> {
        self.inner.create(schema, record).await
    }

    async fn update(
        &self,
        schema: &ResourceSchema,
        record: Record,
        expected_revision: Option<i64>,
    ) -> StoreResult<Record> {
        self.inner.update(schema, record, expected_revision).await
    }

    async fn delete(&self, schema: &ResourceSchema, id: &str) -> StoreResult<()> {
        self.inner.delete(schema, id).await
    }
}
