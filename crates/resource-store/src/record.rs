//! Stored resource records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use resource_acl::{Guarded, Permission, Revisioned};

use crate::schema::{ResourceSchema, REVISION_COLUMN};

/// Cache key for a record: `"<kind>:<id>"`.
pub fn cache_key(kind: &str, id: &str) -> String {
    format!("{}:{}", kind, id)
}

/// A resource instance as held by a store.
///
/// Data columns are flattened next to `id`, so a record's JSON form is the
/// resource itself:
///
/// ```
/// use resource_store::Record;
///
/// let record: Record = serde_json::from_str(
///     r#"{"id":"7","name":"Thomas","age":28,"revision":3}"#,
/// ).unwrap();
/// assert_eq!(record.id, "7");
/// assert_eq!(record.revision, 3);
/// assert_eq!(record.get("name").and_then(|v| v.as_str()), Some("Thomas"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record id; empty until the store assigns one.
    #[serde(default, deserialize_with = "id_from_string_or_number")]
    pub id: String,

    /// Instance permission, overriding the kind default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<Permission>,

    /// Revision counter; 0 means unset.
    #[serde(default, skip_serializing_if = "is_unset")]
    pub revision: i64,

    /// Data columns.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn is_unset(revision: &i64) -> bool {
    *revision == 0
}

/// Integer ids from SQL-backed clients are accepted and kept as text.
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "invalid id: expected string or number, found {}",
            other
        ))),
    }
}

impl Record {
    /// Create an empty record with an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Set a field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Attach an instance permission.
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }

    /// Set the revision.
    pub fn with_revision(mut self, revision: i64) -> Self {
        self.revision = revision;
        self
    }

    /// Read a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Cache key of this record under `kind`.
    pub fn cache_key(&self, kind: &str) -> String {
        cache_key(kind, &self.id)
    }

    /// Column view used for predicate evaluation and ordering: the data
    /// fields plus the id column, and the revision column on revisioned kinds.
    pub fn row(&self, schema: &ResourceSchema) -> Map<String, Value> {
        let mut row = self.fields.clone();
        row.insert(schema.id_column.clone(), Value::String(self.id.clone()));
        if schema.revisioned {
            row.insert(REVISION_COLUMN.to_string(), Value::from(self.revision));
        }
        row
    }
}

impl Guarded for Record {
    fn permission(&self) -> Option<&Permission> {
        self.permission.as_ref()
    }
}

impl Revisioned for Record {
    fn current_revision(&self) -> i64 {
        self.revision
    }

    fn set_next_revision(&mut self) {
        self.revision += 1;
    }
}
