//! # Fluent query builder
//!
//! Builds the same [`FilterExpression`] tree a client could submit as JSON.
//! Misuse is latched: the first error sticks, later calls become no-ops, and
//! the error surfaces from [`Query::expression`] or [`Query::compile`].
//!
//! ```
//! use resource_query::Query;
//!
//! let query = Query::new()
//!     .filter("name").equals("Thomas")
//!     .or("name").equals("Alan")
//!     .and("age").sup(29)
//!     .limit(10);
//!
//! let compiled = query.compile(&["name", "age"][..]).unwrap();
//! assert_eq!(compiled.where_sql().sql, "(name = ? OR name = ?) AND age > ?");
//! ```

use serde_json::Value;

use crate::compile::{compile, ColumnSchema, CompiledFilter};
use crate::error::{QueryError, QueryResult};
use crate::expression::{FilterExpression, FilterItem, OrderTerm};
use crate::operator::{Direction, Operator};

/// Fluent builder for filter expressions.
#[derive(Debug, Clone, Default)]
pub struct Query {
    expr: FilterExpression,
    error: Option<QueryError>,
}

impl Query {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new top-level item (`WHERE key ...`).
    ///
    /// Fails with `NoKey` if the previous top-level item has no key.
    pub fn filter(mut self, key: impl Into<String>) -> Self {
        if self.error.is_some() {
            return self;
        }
        if matches!(self.expr.items.last(), Some(last) if last.key.is_empty()) {
            return self.fail(QueryError::NoKey);
        }
        self.expr.items.push(FilterItem::new(key));
        self
    }

    /// Start a new top-level item after checking the previous one is complete.
    ///
    /// Fails with `NoKey` when there is no previous item or it (or its open
    /// `or` entry) is missing a key or value.
    pub fn and(mut self, key: impl Into<String>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let complete = self
            .expr
            .items
            .last()
            .map(|last| {
                let open = last.or.last().unwrap_or(last);
                !last.key.is_empty() && !open.key.is_empty() && open.has_value()
            })
            .unwrap_or(false);
        if !complete {
            return self.fail(QueryError::NoKey);
        }
        self.expr.items.push(FilterItem::new(key));
        self
    }

    /// Attach an alternative to the last top-level item.
    ///
    /// Fails with `NoKey` if there is no keyed item to attach to, and with
    /// `NoValue` if the currently open item has no value yet.
    pub fn or(mut self, key: impl Into<String>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let Some(last) = self.expr.items.last_mut() else {
            return self.fail(QueryError::NoKey);
        };
        if last.key.is_empty() {
            return self.fail(QueryError::NoKey);
        }
        let open = last.or.last().unwrap_or(last);
        if !open.has_value() {
            return self.fail(QueryError::NoValue);
        }
        last.or.push(FilterItem::new(key));
        self
    }

    /// `key = value`
    pub fn equals(self, value: impl Into<Value>) -> Self {
        self.op(Operator::Equal, value.into())
    }

    /// `key > value`
    pub fn sup(self, value: impl Into<Value>) -> Self {
        self.op(Operator::Sup, value.into())
    }

    /// `key >= value`
    pub fn sup_eq(self, value: impl Into<Value>) -> Self {
        self.op(Operator::SupEq, value.into())
    }

    /// `key < value`
    pub fn inf(self, value: impl Into<Value>) -> Self {
        self.op(Operator::Inf, value.into())
    }

    /// `key <= value`
    pub fn inf_eq(self, value: impl Into<Value>) -> Self {
        self.op(Operator::InfEq, value.into())
    }

    /// `key <> value`
    pub fn not_eq(self, value: impl Into<Value>) -> Self {
        self.op(Operator::NotEq, value.into())
    }

    /// `key IN (values...)`
    pub fn in_values<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.op(Operator::In, Value::Array(values))
    }

    /// `key LIKE pattern`
    pub fn like(self, pattern: impl Into<Value>) -> Self {
        self.op(Operator::Like, pattern.into())
    }

    /// Add an order-by term. With `reorder` set it replaces earlier terms.
    pub fn order(mut self, key: &str, direction: Direction, reorder: bool) -> Self {
        self.expr.order.push(OrderTerm::new(key, direction, reorder));
        self
    }

    /// Limit the number of records.
    pub fn limit(mut self, n: i64) -> Self {
        self.expr.limit = n;
        self
    }

    /// Skip a number of records.
    pub fn skip(mut self, n: i64) -> Self {
        self.expr.skip = n;
        self
    }

    /// Eager-load relations.
    pub fn include<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expr.include = relations.into_iter().map(Into::into).collect();
        self
    }

    /// The latched builder error, if any.
    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    /// The built expression, or the latched builder error.
    pub fn expression(&self) -> QueryResult<&FilterExpression> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(&self.expr),
        }
    }

    /// Consume the builder into its expression.
    pub fn into_expression(self) -> QueryResult<FilterExpression> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.expr),
        }
    }

    /// Compile against a column schema, surfacing any latched error first.
    pub fn compile<S>(&self, schema: &S) -> QueryResult<CompiledFilter>
    where
        S: ColumnSchema + ?Sized,
    {
        compile(self.expression()?, schema)
    }

    /// Assign the operator and value to the open item: the last `or` entry if
    /// one exists, else the last top-level item.
    fn op(mut self, op: Operator, value: Value) -> Self {
        if self.error.is_some() {
            return self;
        }
        let Some(last) = self.expr.items.last_mut() else {
            return self.fail(QueryError::NoKey);
        };
        let target = match last.or.len().checked_sub(1) {
            Some(idx) => &mut last.or[idx],
            None => last,
        };
        if target.key.is_empty() {
            return self.fail(QueryError::NoKey);
        }
        target.op = op.as_str().to_string();
        target.val = Some(value);
        self
    }

    fn fail(mut self, error: QueryError) -> Self {
        tracing::debug!(error = %error, "Query builder misuse");
        self.error = Some(error);
        self
    }
}

impl From<FilterExpression> for Query {
    fn from(expr: FilterExpression) -> Self {
        Self { expr, error: None }
    }
}
