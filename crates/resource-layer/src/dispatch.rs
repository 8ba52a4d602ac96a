//! # Dispatch
//!
//! Turns an inbound operation on a resource kind into calls on the registry,
//! the filter compiler, the cache-aside coordinator and the permission
//! evaluator, in a fixed order:
//!
//! | Operation | Steps |
//! |-----------|-------|
//! | read      | policy → cache/store fetch → read permission |
//! | create    | policy → decode → kind write permission → store create → cache refresh |
//! | update    | policy → decode → store fetch → write permission → revision check → conditional update → cache refresh |
//! | delete    | policy → store fetch → write permission → cache eviction → store delete → cache eviction |
//! | query     | policy → compile → store fetch → cache refresh → drop unreadable records |
//!
//! Every operation runs under the request deadline, or the configured default
//! when the caller supplies none.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::Instant;

use resource_acl::{
    can_perform, check_revision, effective_permission, Access, Identity, Operation,
};
use resource_query::{compile, FilterExpression};
use resource_store::{Record, ResourceSchema};

use crate::context::LayerContext;
use crate::error::{LayerError, LayerResult};
use crate::registry::ResourceDescriptor;

/// Per-request state: who is acting and until when.
#[derive(Clone, Default)]
pub struct RequestContext {
    identity: Option<Arc<dyn Identity>>,
    deadline: Option<Instant>,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("authenticated", &self.identity.is_some())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl RequestContext {
    /// A request with no identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A request acting as `identity`.
    pub fn for_identity(identity: Arc<dyn Identity>) -> Self {
        Self {
            identity: Some(identity),
            deadline: None,
        }
    }

    /// Abort the operation at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Abort the operation `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The acting identity, `None` when anonymous.
    pub fn identity(&self) -> Option<&dyn Identity> {
        self.identity.as_deref()
    }

    /// Explicit deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// An inbound operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Requested operation.
    pub operation: Operation,
    /// Target kind.
    pub kind: String,
    /// Record id for read, update and delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Record payload for create and update; filter expression for query,
    /// either as an object or as a JSON-encoded string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Request {
    /// Read one record.
    pub fn read(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(Operation::Read, kind, Some(id.into()), None)
    }

    /// Create a record from `body`.
    pub fn create(kind: impl Into<String>, body: Value) -> Self {
        Self::new(Operation::Create, kind, None, Some(body))
    }

    /// Update record `id` with `body`.
    pub fn update(kind: impl Into<String>, id: impl Into<String>, body: Value) -> Self {
        Self::new(Operation::Update, kind, Some(id.into()), Some(body))
    }

    /// Delete record `id`.
    pub fn delete(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(Operation::Delete, kind, Some(id.into()), None)
    }

    /// Query with a filter expression.
    pub fn query(kind: impl Into<String>, body: Value) -> Self {
        Self::new(Operation::Query, kind, None, Some(body))
    }

    fn new(operation: Operation, kind: impl Into<String>, id: Option<String>, body: Option<Value>) -> Self {
        Self {
            operation,
            kind: kind.into(),
            id,
            body,
        }
    }
}

/// A rendered result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

impl Response {
    /// 200 with `body`.
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// Render an error as `{"message", "code", "data"?}`.
    pub fn from_error(error: &LayerError) -> Self {
        let mut body = json!({
            "message": error.to_string(),
            "code": error.error_code(),
        });
        if let Some(data) = error.data() {
            body["data"] = data;
        }
        Self {
            status: error.status_code(),
            body,
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes operations against a [`LayerContext`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    ctx: LayerContext,
}

impl Dispatcher {
    /// Create a dispatcher over `ctx`.
    pub fn new(ctx: LayerContext) -> Self {
        Self { ctx }
    }

    /// Shared context.
    pub fn context(&self) -> &LayerContext {
        &self.ctx
    }

    /// Read one record by id.
    pub async fn read(&self, rc: &RequestContext, kind: &str, id: &str) -> LayerResult<Record> {
        self.within(rc, Operation::Read, kind, async {
            let descriptor = self.authorize(kind, Operation::Read)?;
            let schema = &descriptor.schema;
            require_id(id)?;

            let record = self
                .ctx
                .cache
                .fetch_one(self.ctx.store.as_ref(), schema, id)
                .await?;
            check_access(&record, schema, rc, Access::Read)?;
            Ok(record)
        })
        .await
    }

    /// Create a record from a JSON payload.
    pub async fn create(&self, rc: &RequestContext, kind: &str, body: Value) -> LayerResult<Record> {
        self.within(rc, Operation::Create, kind, async {
            let descriptor = self.authorize(kind, Operation::Create)?;
            let schema = &descriptor.schema;
            let record = decode_record(body)?;

            can_perform(schema.default_permission.as_ref(), rc.identity(), Access::Write)
                .map_err(|e| LayerError::from_access(e, &record))?;

            let created = self.ctx.store.create(schema, record).await?;
            self.ctx.cache.on_create_or_update(schema, &created).await;
            tracing::debug!(kind = %kind, id = %created.id, "Created record");
            Ok(created)
        })
        .await
    }

    /// Merge a JSON payload into record `id`.
    ///
    /// Revisioned kinds require the payload to carry the stored revision.
    pub async fn update(
        &self,
        rc: &RequestContext,
        kind: &str,
        id: &str,
        body: Value,
    ) -> LayerResult<Record> {
        self.within(rc, Operation::Update, kind, async {
            let descriptor = self.authorize(kind, Operation::Update)?;
            let schema = &descriptor.schema;
            require_id(id)?;
            let mut proposed = decode_record(body)?;
            proposed.id = id.to_string();

            let current = self.ctx.store.find_one(schema, id).await?;
            check_access(&current, schema, rc, Access::Write)?;

            let expected_revision = if schema.revisioned {
                check_revision(&current, &proposed)
                    .map_err(|e| LayerError::from_access(e, &current))?;
                Some(proposed.revision)
            } else {
                None
            };

            let updated = self
                .ctx
                .store
                .update(schema, proposed, expected_revision)
                .await?;
            self.ctx.cache.on_create_or_update(schema, &updated).await;
            tracing::debug!(kind = %kind, id = %id, revision = updated.revision, "Updated record");
            Ok(updated)
        })
        .await
    }

    /// Delete record `id`, returning it as last stored.
    pub async fn delete(&self, rc: &RequestContext, kind: &str, id: &str) -> LayerResult<Record> {
        self.within(rc, Operation::Delete, kind, async {
            let descriptor = self.authorize(kind, Operation::Delete)?;
            let schema = &descriptor.schema;
            require_id(id)?;

            let current = self.ctx.store.find_one(schema, id).await?;
            check_access(&current, schema, rc, Access::Write)?;

            let current = self
                .ctx
                .cache
                .on_before_delete(self.ctx.store.as_ref(), schema, &current)
                .await?;
            self.ctx.store.delete(schema, &current.id).await?;
            self.ctx.cache.on_after_delete(schema, &current.id).await;
            tracing::debug!(kind = %kind, id = %id, "Deleted record");
            Ok(current)
        })
        .await
    }

    /// Run a filter expression.
    ///
    /// Records the identity may not read are dropped from the result.
    pub async fn query(
        &self,
        rc: &RequestContext,
        kind: &str,
        expr: &FilterExpression,
    ) -> LayerResult<Vec<Record>> {
        self.within(rc, Operation::Query, kind, async {
            let descriptor = self.authorize(kind, Operation::Query)?;
            let schema = &descriptor.schema;
            let filter = compile(expr, schema)?;

            let records = self.ctx.store.find_many(schema, &filter).await?;
            self.ctx.cache.on_fetched(schema, &filter, &records).await;

            let fetched = records.len();
            let visible: Vec<Record> = records
                .into_iter()
                .filter(|record| check_access(record, schema, rc, Access::Read).is_ok())
                .collect();
            if visible.len() < fetched {
                tracing::debug!(
                    kind = %kind,
                    dropped = fetched - visible.len(),
                    "Dropped unreadable records from query result"
                );
            }
            Ok(visible)
        })
        .await
    }

    /// Execute a request and render the outcome.
    pub async fn handle(&self, rc: &RequestContext, request: Request) -> Response {
        match self.dispatch(rc, request).await {
            Ok(body) => Response::ok(body),
            Err(e) => Response::from_error(&e),
        }
    }

    async fn dispatch(&self, rc: &RequestContext, request: Request) -> LayerResult<Value> {
        let Request {
            operation,
            kind,
            id,
            body,
        } = request;
        let id = id.unwrap_or_default();

        match operation {
            Operation::Read => to_json(&self.read(rc, &kind, &id).await?),
            Operation::Create => {
                let body = body.unwrap_or(Value::Null);
                to_json(&self.create(rc, &kind, body).await?)
            }
            Operation::Update => {
                let body = body.unwrap_or(Value::Null);
                to_json(&self.update(rc, &kind, &id, body).await?)
            }
            Operation::Delete => to_json(&self.delete(rc, &kind, &id).await?),
            Operation::Query => {
                let expr = match self
                    .authorize(&kind, Operation::Query)
                    .and_then(|_| decode_filter(body))
                {
                    Ok(expr) => expr,
                    Err(e) => {
                        log_failure(Operation::Query, &kind, &e);
                        return Err(e);
                    }
                };
                to_json(&self.query(rc, &kind, &expr).await?)
            }
        }
    }

    fn authorize(&self, kind: &str, operation: Operation) -> LayerResult<&ResourceDescriptor> {
        let descriptor = self.ctx.registry.lookup(kind)?;
        descriptor.require(operation)?;
        Ok(descriptor)
    }

    async fn within<T, F>(&self, rc: &RequestContext, operation: Operation, kind: &str, fut: F) -> LayerResult<T>
    where
        F: Future<Output = LayerResult<T>>,
    {
        let deadline = rc
            .deadline
            .or_else(|| self.ctx.config.request_timeout().map(|t| Instant::now() + t));

        let result = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, fut).await {
                Ok(result) => result,
                Err(_) => Err(LayerError::DeadlineExceeded),
            },
            None => fut.await,
        };

        if let Err(e) = &result {
            log_failure(operation, kind, e);
        }
        result
    }
}

fn log_failure(operation: Operation, kind: &str, error: &LayerError) {
    if error.is_server_error() {
        tracing::error!(operation = %operation, kind = %kind, error = %error, "Resource operation failed");
    } else {
        tracing::debug!(
            operation = %operation,
            kind = %kind,
            code = error.error_code(),
            error = %error,
            "Resource operation rejected"
        );
    }
}

fn check_access(
    record: &Record,
    schema: &ResourceSchema,
    rc: &RequestContext,
    access: Access,
) -> LayerResult<()> {
    let permission = effective_permission(record, schema.default_permission.as_ref());
    can_perform(permission, rc.identity(), access).map_err(|e| LayerError::from_access(e, record))
}

fn require_id(id: &str) -> LayerResult<()> {
    if id.is_empty() {
        return Err(LayerError::BadRequest("id is required".to_string()));
    }
    Ok(())
}

fn decode_record(body: Value) -> LayerResult<Record> {
    if !body.is_object() {
        return Err(LayerError::BadRequest("payload must be a JSON object".to_string()));
    }
    serde_json::from_value(body).map_err(|e| LayerError::BadRequest(format!("Invalid payload: {}", e)))
}

fn decode_filter(body: Option<Value>) -> LayerResult<FilterExpression> {
    let expr = match body {
        None | Some(Value::Null) => FilterExpression::new(),
        Some(Value::String(s)) if s.trim().is_empty() => FilterExpression::new(),
        Some(Value::String(s)) => FilterExpression::from_json(&s)?,
        Some(value) => FilterExpression::from_value(value)?,
    };
    Ok(expr)
}

fn to_json<T: Serialize>(value: &T) -> LayerResult<Value> {
    serde_json::to_value(value).map_err(|e| LayerError::Storage(format!("Failed to encode response: {}", e)))
}
