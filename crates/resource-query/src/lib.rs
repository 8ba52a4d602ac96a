//! # Resource Query
//!
//! Injection-safe filter compiler for resource queries.
//!
//! ## Overview
//!
//! Filters arrive either as a JSON document or from the fluent [`Query`]
//! builder. Both produce a [`FilterExpression`], which [`compile`] validates
//! against the resource's columns before any store is touched.
//!
//! ```text
//! WHERE (name = 'Thomas' OR name = 'Alan') AND age > 29
//!
//! {"where": [
//!   {"key": "name", "op": "=", "val": "Thomas",
//!    "or": [{"key": "name", "op": "=", "val": "Alan"}]},
//!   {"key": "age", "op": ">", "val": 29}
//! ]}
//! ```
//!
//! Operators come from a fixed whitelist (`=`, `>`, `>=`, `<`, `<=`, `<>`,
//! `in`, `like`) and every key must name a real column. Values are only ever
//! bound as parameters in [`SqlFragment`]s, never spliced into SQL text.
//!
//! ## Usage
//!
//! ```rust
//! use resource_query::{compile, FilterExpression, Query, QueryError};
//!
//! let columns = ["id", "name", "age"];
//!
//! let built = Query::new()
//!     .filter("name").equals("Thomas")
//!     .or("name").equals("Alan")
//!     .and("age").sup(29)
//!     .compile(&columns[..])
//!     .unwrap();
//!
//! let decoded = FilterExpression::from_json(
//!     r#"{"where":[{"key":"name","op":"=","val":"Thomas",
//!                   "or":[{"key":"name","op":"=","val":"Alan"}]},
//!                  {"key":"age","op":">","val":29}]}"#,
//! ).unwrap();
//! assert_eq!(compile(&decoded, &columns[..]).unwrap(), built);
//!
//! // Builder misuse is reported, not panicked on
//! let err = Query::new().filter("name").or("age").compile(&columns[..]).unwrap_err();
//! assert_eq!(err, QueryError::NoValue);
//! ```

pub mod builder;
pub mod compile;
pub mod error;
pub mod expression;
pub mod operator;
pub mod predicate;

// Re-export main types for convenience
pub use builder::Query;
pub use compile::{compile, ColumnSchema, CompiledFilter};
pub use error::{QueryError, QueryResult};
pub use expression::{FilterExpression, FilterItem, OrderTerm};
pub use operator::{Direction, Operator};
pub use predicate::{compare_values, like_match, Clause, Comparison, OrderBy, Predicate, SqlFragment};
