//! # Operators
//!
//! The fixed comparison whitelist and sort directions. Anything outside the
//! whitelist fails compilation.

use serde::{Deserialize, Serialize};

/// Comparison operators accepted in filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `=`
    #[serde(rename = "=")]
    Equal,
    /// `>`
    #[serde(rename = ">")]
    Sup,
    /// `>=`
    #[serde(rename = ">=")]
    SupEq,
    /// `<`
    #[serde(rename = "<")]
    Inf,
    /// `<=`
    #[serde(rename = "<=")]
    InfEq,
    /// `<>`
    #[serde(rename = "<>")]
    NotEq,
    /// `in`
    #[serde(rename = "in")]
    In,
    /// `like`
    #[serde(rename = "like")]
    Like,
}

impl Operator {
    /// Wire representation of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::Sup => ">",
            Operator::SupEq => ">=",
            Operator::Inf => "<",
            Operator::InfEq => "<=",
            Operator::NotEq => "<>",
            Operator::In => "in",
            Operator::Like => "like",
        }
    }

    /// SQL keyword or symbol used when rendering the predicate.
    pub fn sql(&self) -> &'static str {
        match self {
            Operator::In => "IN",
            Operator::Like => "LIKE",
            other => other.as_str(),
        }
    }

    /// Parse an operator, returning `None` when it is not whitelisted.
    ///
    /// Only the exact wire form is accepted; case and padding variants are
    /// rejected.
    ///
    /// # Example
    ///
    /// ```
    /// use resource_query::operator::Operator;
    ///
    /// assert_eq!(Operator::parse(">="), Some(Operator::SupEq));
    /// assert_eq!(Operator::parse("like"), Some(Operator::Like));
    /// assert_eq!(Operator::parse("LIKE"), None);
    /// assert_eq!(Operator::parse("!="), None);
    /// assert_eq!(Operator::parse("= 1; DROP TABLE x"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "=" => Some(Operator::Equal),
            ">" => Some(Operator::Sup),
            ">=" => Some(Operator::SupEq),
            "<" => Some(Operator::Inf),
            "<=" => Some(Operator::InfEq),
            "<>" => Some(Operator::NotEq),
            "in" => Some(Operator::In),
            "like" => Some(Operator::Like),
            _ => None,
        }
    }

    /// Get all whitelisted operators.
    pub fn all() -> &'static [Operator] {
        &[
            Operator::Equal,
            Operator::Sup,
            Operator::SupEq,
            Operator::Inf,
            Operator::InfEq,
            Operator::NotEq,
            Operator::In,
            Operator::Like,
        ]
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sort direction for order-by terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl Direction {
    /// SQL keyword for the direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    /// Parse a direction (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Some(Direction::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Some(Direction::Desc)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
