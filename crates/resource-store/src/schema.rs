//! # Resource schemas
//!
//! A [`ResourceSchema`] declares what the layer knows about a kind: its
//! columns (used to validate filters), whether it carries a revision, its
//! default permission and the relations that may be eager-loaded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use resource_acl::Permission;
use resource_query::ColumnSchema;

/// Name of the revision column on revisioned kinds.
pub const REVISION_COLUMN: &str = "revision";

/// A has-many relation: records of `kind` whose `foreign_key` equals the
/// parent id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Name used in `include` directives.
    pub name: String,
    /// Kind of the related records.
    pub kind: String,
    /// Column on the related kind that holds the parent id.
    pub foreign_key: String,
}

impl Relation {
    /// Create a relation.
    pub fn has_many(
        name: impl Into<String>,
        kind: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            foreign_key: foreign_key.into(),
        }
    }
}

/// Schema of a resource kind.
///
/// # Example
///
/// ```
/// use resource_store::schema::ResourceSchema;
/// use resource_query::ColumnSchema;
///
/// let users = ResourceSchema::new("users")
///     .with_columns(["name", "age"])
///     .with_revisions();
///
/// assert_eq!(users.resolve_column("NAME"), Some("name"));
/// assert_eq!(users.resolve_column("revision"), Some("revision"));
/// assert_eq!(users.resolve_column("salary"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSchema {
    /// Stable kind name (table or collection).
    pub kind: String,
    /// Declared columns, including the id column.
    pub columns: Vec<String>,
    /// Column holding the record id.
    pub id_column: String,
    /// Whether updates go through revision checks.
    pub revisioned: bool,
    /// Permission applied when a record carries none.
    pub default_permission: Option<Permission>,
    /// Relations available to `include`.
    pub relations: Vec<Relation>,
}

impl ResourceSchema {
    /// Create a schema with only an `id` column.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            columns: vec!["id".to_string()],
            id_column: "id".to_string(),
            revisioned: false,
            default_permission: None,
            relations: Vec::new(),
        }
    }

    /// Add columns.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            let column = column.into();
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }
        self
    }

    /// Use a different id column name.
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        let previous = std::mem::replace(&mut self.id_column, column.clone());
        self.columns.retain(|c| c != &previous);
        self.with_columns([column])
    }

    /// Mark the kind as revisioned and expose its revision column.
    pub fn with_revisions(mut self) -> Self {
        self.revisioned = true;
        self.with_columns([REVISION_COLUMN])
    }

    /// Set the kind's default permission.
    pub fn with_default_permission(mut self, permission: Permission) -> Self {
        self.default_permission = Some(permission);
        self
    }

    /// Declare a relation.
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Look up a relation by name (exact, then case-insensitive).
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations
            .iter()
            .find(|r| r.name == name)
            .or_else(|| self.relations.iter().find(|r| r.name.eq_ignore_ascii_case(name)))
    }

    /// Keep only fields naming a data column, renamed to their canonical
    /// spelling. The id and revision columns are carried on the record itself.
    pub fn retain_columns(&self, fields: Map<String, Value>) -> Map<String, Value> {
        let mut kept = Map::with_capacity(fields.len());
        for (key, value) in fields {
            match self.resolve_column(&key) {
                Some(column) if column != self.id_column && column != REVISION_COLUMN => {
                    kept.insert(column.to_string(), value);
                }
                _ => {
                    tracing::trace!(kind = %self.kind, field = %key, "Dropping undeclared field");
                }
            }
        }
        kept
    }
}

impl ColumnSchema for ResourceSchema {
    fn resolve_column(&self, name: &str) -> Option<&str> {
        self.columns.resolve_column(name)
    }
}
