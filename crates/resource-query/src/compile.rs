//! # Filter compilation
//!
//! Validates a [`FilterExpression`] against a resource's columns and lowers it
//! to a [`CompiledFilter`]. Compilation fails on the first violation and never
//! touches the store.

use serde::Serialize;
use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::expression::{FilterExpression, FilterItem, OrderTerm};
use crate::operator::{Direction, Operator};
use crate::predicate::{Clause, Comparison, OrderBy, Predicate, SqlFragment};

/// Column introspection for a resource kind.
pub trait ColumnSchema {
    /// Resolve a column reference to its canonical name.
    ///
    /// Exact matches win; otherwise an ASCII case-insensitive match is used.
    fn resolve_column(&self, name: &str) -> Option<&str>;
}

impl<S: AsRef<str>> ColumnSchema for [S] {
    fn resolve_column(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|c| c.as_ref() == name)
            .or_else(|| self.iter().find(|c| c.as_ref().eq_ignore_ascii_case(name)))
            .map(|c| c.as_ref())
    }
}

impl<S: AsRef<str>> ColumnSchema for Vec<S> {
    fn resolve_column(&self, name: &str) -> Option<&str> {
        self.as_slice().resolve_column(name)
    }
}

/// A validated filter ready for a backing store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompiledFilter {
    /// Row predicate.
    pub predicate: Predicate,
    /// Effective ordering after reorder flags are applied.
    pub order: Vec<OrderBy>,
    /// Maximum number of records.
    pub limit: Option<usize>,
    /// Number of records to skip.
    pub skip: Option<usize>,
    /// Relations to eager-load.
    pub include: Vec<String>,
}

impl CompiledFilter {
    /// Parameterized WHERE condition.
    pub fn where_sql(&self) -> SqlFragment {
        self.predicate.to_sql()
    }

    /// ORDER BY terms joined with commas, or `None` when unordered.
    pub fn order_sql(&self) -> Option<String> {
        if self.order.is_empty() {
            return None;
        }
        Some(
            self.order
                .iter()
                .map(OrderBy::to_sql)
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

/// Compile a structured expression against a column schema.
///
/// Each item and each `or` entry is checked in turn for a key, a whitelisted
/// operator, a known column and a value. An `or` entry may not carry its own
/// `or` list. Order-by columns are canonicalized; a term with its reorder flag
/// set discards every term before it.
///
/// # Example
///
/// ```
/// use resource_query::compile::compile;
/// use resource_query::expression::{FilterExpression, FilterItem};
/// use resource_query::error::QueryError;
///
/// let columns = ["id", "name", "age"];
/// let mut expr = FilterExpression::new();
/// expr.items.push(FilterItem::comparison("name", "=", "Thomas"));
/// assert!(compile(&expr, &columns[..]).is_ok());
///
/// expr.items.push(FilterItem::comparison("salary", ">", 10));
/// assert_eq!(
///     compile(&expr, &columns[..]),
///     Err(QueryError::UnknownColumn("salary".into()))
/// );
/// ```
pub fn compile<S>(expr: &FilterExpression, schema: &S) -> QueryResult<CompiledFilter>
where
    S: ColumnSchema + ?Sized,
{
    let mut clauses = Vec::with_capacity(expr.items.len());
    for item in &expr.items {
        let mut alternatives = Vec::with_capacity(1 + item.or.len());
        alternatives.push(compile_item(item, schema)?);
        for alternative in &item.or {
            if !alternative.or.is_empty() {
                return Err(QueryError::Malformed(format!(
                    "nested or group under {}",
                    alternative.key
                )));
            }
            alternatives.push(compile_item(alternative, schema)?);
        }
        clauses.push(Clause::new(alternatives));
    }

    let mut order = Vec::with_capacity(expr.order.len());
    for term in &expr.order {
        let order_by = compile_order(term, schema)?;
        if term.reorder {
            order.clear();
        }
        order.push(order_by);
    }

    let compiled = CompiledFilter {
        predicate: Predicate::new(clauses),
        order,
        limit: positive(expr.limit),
        skip: positive(expr.skip),
        include: expr.include.clone(),
    };

    tracing::trace!(
        clauses = compiled.predicate.clauses.len(),
        order_terms = compiled.order.len(),
        "Compiled filter expression"
    );

    Ok(compiled)
}

fn compile_item<S>(item: &FilterItem, schema: &S) -> QueryResult<Comparison>
where
    S: ColumnSchema + ?Sized,
{
    if item.key.is_empty() {
        return Err(QueryError::NoKey);
    }

    let op = Operator::parse(&item.op).ok_or_else(|| QueryError::InvalidOperator(item.op.clone()))?;

    let column = schema
        .resolve_column(&item.key)
        .ok_or_else(|| QueryError::UnknownColumn(item.key.clone()))?;

    let value = match &item.val {
        Some(v) if !v.is_null() => v.clone(),
        _ => return Err(QueryError::NoValue),
    };

    Ok(Comparison {
        column: column.to_string(),
        op,
        value: normalize_value(op, value),
    })
}

fn compile_order<S>(term: &OrderTerm, schema: &S) -> QueryResult<OrderBy>
where
    S: ColumnSchema + ?Sized,
{
    let mut parts = term.key.split_whitespace();
    let name = parts
        .next()
        .ok_or_else(|| QueryError::InvalidOrder(term.key.clone()))?;
    let direction = match parts.next() {
        None => Direction::Asc,
        Some(d) => Direction::parse(d).ok_or_else(|| QueryError::InvalidOrder(term.key.clone()))?,
    };
    if parts.next().is_some() {
        return Err(QueryError::InvalidOrder(term.key.clone()));
    }

    let column = schema
        .resolve_column(name)
        .ok_or_else(|| QueryError::UnknownColumn(name.to_string()))?;

    Ok(OrderBy {
        column: column.to_string(),
        direction,
    })
}

/// `in` always compares against a list.
fn normalize_value(op: Operator, value: Value) -> Value {
    match (op, value) {
        (Operator::In, Value::Array(values)) => Value::Array(values),
        (Operator::In, scalar) => Value::Array(vec![scalar]),
        (_, value) => value,
    }
}

fn positive(n: i64) -> Option<usize> {
    if n > 0 {
        usize::try_from(n).ok()
    } else {
        None
    }
}
