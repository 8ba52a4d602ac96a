//! Compiled predicates.
//!
//! A predicate is in conjunctive normal form: every [`Clause`] must hold, and
//! a clause holds when any of its [`Comparison`]s does. Column names are
//! already validated and canonical; values only ever travel as positional
//! parameters.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

use crate::operator::{Direction, Operator};

/// A single validated comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Canonical column name.
    pub column: String,
    /// Whitelisted operator.
    pub op: Operator,
    /// Comparison value; an array for `in`.
    pub value: Value,
}

impl Comparison {
    /// Evaluate against one row. Missing and null columns never match.
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        let actual = match row.get(&self.column) {
            Some(v) if !v.is_null() => v,
            _ => return false,
        };

        match self.op {
            Operator::Equal => compare_values(actual, &self.value) == Some(Ordering::Equal),
            Operator::NotEq => {
                matches!(compare_values(actual, &self.value), Some(o) if o != Ordering::Equal)
            }
            Operator::Sup => compare_values(actual, &self.value) == Some(Ordering::Greater),
            Operator::SupEq => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Inf => compare_values(actual, &self.value) == Some(Ordering::Less),
            Operator::InfEq => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::In => in_values(&self.value)
                .iter()
                .any(|candidate| compare_values(actual, candidate) == Some(Ordering::Equal)),
            Operator::Like => match (text_of(actual), self.value.as_str()) {
                (Some(text), Some(pattern)) => like_match(&text, pattern),
                _ => false,
            },
        }
    }

    fn render(&self, sql: &mut String, params: &mut Vec<Value>) {
        if self.op == Operator::In {
            let values = in_values(&self.value);
            if values.is_empty() {
                sql.push_str("1 = 0");
                return;
            }
            let placeholders = vec!["?"; values.len()].join(", ");
            sql.push_str(&format!("{} IN ({})", self.column, placeholders));
            params.extend(values.iter().cloned());
        } else {
            sql.push_str(&format!("{} {} ?", self.column, self.op.sql()));
            params.push(self.value.clone());
        }
    }
}

/// Comparisons OR-ed together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clause {
    /// Alternatives; the first is the item's own comparison.
    pub alternatives: Vec<Comparison>,
}

impl Clause {
    /// Create a clause from its alternatives.
    pub fn new(alternatives: Vec<Comparison>) -> Self {
        Self { alternatives }
    }

    /// Evaluate against one row.
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        self.alternatives.iter().any(|c| c.matches(row))
    }
}

/// Parameterized SQL text plus its positional parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SqlFragment {
    /// SQL with `?` placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<Value>,
}

/// Clauses AND-ed together. An empty predicate matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Predicate {
    /// Conjunction of clauses.
    pub clauses: Vec<Clause>,
}

impl Predicate {
    /// Create a predicate from its clauses.
    pub fn new(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }

    /// Whether the predicate has no conditions.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate against one row.
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        self.clauses.iter().all(|c| c.matches(row))
    }

    /// Render as a parameterized SQL condition.
    ///
    /// # Example
    ///
    /// ```
    /// use resource_query::operator::Operator;
    /// use resource_query::predicate::{Clause, Comparison, Predicate};
    /// use serde_json::json;
    ///
    /// let eq = |v: &str| Comparison { column: "name".into(), op: Operator::Equal, value: json!(v) };
    /// let predicate = Predicate::new(vec![
    ///     Clause::new(vec![eq("Thomas"), eq("Alan")]),
    ///     Clause::new(vec![Comparison { column: "age".into(), op: Operator::Sup, value: json!(29) }]),
    /// ]);
    ///
    /// let fragment = predicate.to_sql();
    /// assert_eq!(fragment.sql, "(name = ? OR name = ?) AND age > ?");
    /// assert_eq!(fragment.params, vec![json!("Thomas"), json!("Alan"), json!(29)]);
    /// ```
    pub fn to_sql(&self) -> SqlFragment {
        let mut fragment = SqlFragment::default();
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                fragment.sql.push_str(" AND ");
            }
            let grouped = clause.alternatives.len() > 1;
            if grouped {
                fragment.sql.push('(');
            }
            for (j, comparison) in clause.alternatives.iter().enumerate() {
                if j > 0 {
                    fragment.sql.push_str(" OR ");
                }
                comparison.render(&mut fragment.sql, &mut fragment.params);
            }
            if grouped {
                fragment.sql.push(')');
            }
        }
        fragment
    }
}

/// A validated order-by directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    /// Canonical column name.
    pub column: String,
    /// Sort direction.
    pub direction: Direction,
}

impl OrderBy {
    /// Render as an SQL order term.
    pub fn to_sql(&self) -> String {
        format!("{} {}", self.column, self.direction.as_str())
    }
}

/// Compare two JSON values the way a relational store would.
///
/// Numbers compare numerically, and a numeric string compares numerically
/// against a number. Strings and booleans compare within their own type.
/// Anything else is incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::Number(x), Value::String(s)) => compare_numbers(x, &s.trim().parse().ok()?),
        (Value::String(s), Value::Number(y)) => compare_numbers(&s.trim().parse().ok()?, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Integers compare exactly; floats fall back to `f64`.
fn compare_numbers(x: &Number, y: &Number) -> Option<Ordering> {
    match (x.as_i64(), y.as_i64(), x.as_u64(), y.as_u64()) {
        (Some(a), Some(b), _, _) => Some(a.cmp(&b)),
        (_, _, Some(a), Some(b)) => Some(a.cmp(&b)),
        // Only one side fits i64: the other is above i64::MAX.
        (Some(_), None, _, Some(_)) => Some(Ordering::Less),
        (None, Some(_), Some(_), _) => Some(Ordering::Greater),
        _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
    }
}

fn in_values(value: &Value) -> &[Value] {
    match value {
        Value::Array(values) => values.as_slice(),
        other => std::slice::from_ref(other),
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// SQL `LIKE` matching: `%` is any run, `_` is one character, ASCII
/// case-insensitive.
pub fn like_match(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();
    let p: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();

    let (mut ti, mut pi) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if let Some((star, mark)) = backtrack {
            pi = star + 1;
            ti = mark + 1;
            backtrack = Some((star, mark + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '%')
}
