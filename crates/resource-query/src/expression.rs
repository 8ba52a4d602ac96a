//! Structured filter expressions and their JSON wire shape.
//!
//! ```text
//! {
//!   "where":   [ { "key": str, "op": str, "val": any, "or": [ ... ] } ],
//!   "order":   { "<column>[ ASC|DESC]": bool },
//!   "limit":   int64,
//!   "skip":    int64,
//!   "include": [ "<relation>", ... ]
//! }
//! ```
//!
//! Top-level items are AND-ed. Each item's `or` list is OR-ed with the item's
//! own comparison. Nothing here is validated; see [`crate::compile`].

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{QueryError, QueryResult};
use crate::operator::Direction;

/// One comparison, plus alternatives that attach only to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterItem {
    /// Column reference.
    #[serde(default, deserialize_with = "null_as_default")]
    pub key: String,

    /// Operator in wire form; validated at compile time.
    #[serde(default, deserialize_with = "null_as_default")]
    pub op: String,

    /// Comparison value.
    #[serde(default)]
    pub val: Option<Value>,

    /// Alternatives OR-ed against this item.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub or: Vec<FilterItem>,
}

impl FilterItem {
    /// Create an item with only a key selected.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Create a fully specified comparison.
    pub fn comparison(key: impl Into<String>, op: impl Into<String>, val: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            op: op.into(),
            val: Some(val.into()),
            or: Vec::new(),
        }
    }

    /// Attach an alternative.
    pub fn or_item(mut self, item: FilterItem) -> Self {
        self.or.push(item);
        self
    }

    /// Whether a non-null value has been assigned.
    pub fn has_value(&self) -> bool {
        matches!(&self.val, Some(v) if !v.is_null())
    }
}

/// One order-by entry.
///
/// `key` keeps the wire form: the bare column for ascending order, or the
/// column followed by `DESC`. When `reorder` is set the term replaces every
/// term before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    /// Column, optionally followed by a direction.
    pub key: String,
    /// Discard previously accumulated ordering.
    pub reorder: bool,
}

impl OrderTerm {
    /// Build a term from a column and direction.
    pub fn new(column: &str, direction: Direction, reorder: bool) -> Self {
        let key = match direction {
            Direction::Asc => column.to_string(),
            Direction::Desc => format!("{} {}", column, direction.as_str()),
        };
        Self { key, reorder }
    }
}

/// A complete structured filter expression.
///
/// # Example
///
/// ```
/// use resource_query::expression::FilterExpression;
///
/// let expr = FilterExpression::from_json(
///     r#"{"where":[{"key":"name","op":"=","val":"Thomas"}],"limit":1}"#,
/// ).unwrap();
/// assert_eq!(expr.items.len(), 1);
/// assert_eq!(expr.limit, 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterExpression {
    /// Top-level items, AND-ed together.
    #[serde(rename = "where", default, deserialize_with = "null_as_default")]
    pub items: Vec<FilterItem>,

    /// Order-by terms, in submission order.
    #[serde(default, with = "order_map")]
    pub order: Vec<OrderTerm>,

    /// Maximum number of records; 0 or less means unlimited.
    #[serde(default, deserialize_with = "null_as_default")]
    pub limit: i64,

    /// Number of records to skip; 0 or less means none.
    #[serde(default, deserialize_with = "null_as_default")]
    pub skip: i64,

    /// Relations to eager-load.
    #[serde(default, deserialize_with = "null_as_default")]
    pub include: Vec<String>,
}

impl FilterExpression {
    /// Create an empty expression (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an expression from its JSON wire shape.
    pub fn from_json(s: &str) -> QueryResult<Self> {
        serde_json::from_str(s).map_err(|e| QueryError::Malformed(e.to_string()))
    }

    /// Decode an expression from an already-parsed JSON value.
    pub fn from_value(value: Value) -> QueryResult<Self> {
        serde_json::from_value(value).map_err(|e| QueryError::Malformed(e.to_string()))
    }

    /// Encode the expression to its JSON wire shape.
    pub fn to_json(&self) -> QueryResult<String> {
        serde_json::to_string(self).map_err(|e| QueryError::Malformed(e.to_string()))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Serializes `Vec<OrderTerm>` as a JSON object while keeping entry order.
mod order_map {
    use super::*;

    pub fn serialize<S>(terms: &[OrderTerm], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(terms.len()))?;
        for term in terms {
            map.serialize_entry(&term.key, &term.reorder)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<OrderTerm>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_option(OptionalOrderVisitor)
    }

    struct OptionalOrderVisitor;

    impl<'de> Visitor<'de> for OptionalOrderVisitor {
        type Value = Vec<OrderTerm>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of column to reorder flag, or null")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_map(OrderVisitor)
        }
    }

    struct OrderVisitor;

    impl<'de> Visitor<'de> for OrderVisitor {
        type Value = Vec<OrderTerm>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of column to reorder flag")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut terms = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, reorder)) = access.next_entry::<String, Option<bool>>()? {
                terms.push(OrderTerm {
                    key,
                    reorder: reorder.unwrap_or(false),
                });
            }
            Ok(terms)
        }
    }
}
