//! # Resource registry
//!
//! Maps each resource kind to its schema and access policy. The registry is
//! assembled with a [`RegistryBuilder`] during startup and frozen behind an
//! `Arc`; request handling only reads it.
//!
//! ```
//! use resource_acl::{AccessPolicy, Operation};
//! use resource_layer::registry::ResourceRegistry;
//! use resource_store::ResourceSchema;
//!
//! let registry = ResourceRegistry::builder()
//!     .register(ResourceSchema::new("users").with_columns(["name"]), AccessPolicy::all())
//!     .register(ResourceSchema::new("audit"), AccessPolicy::read_only())
//!     .build();
//!
//! assert!(registry.lookup("users").unwrap().allows(Operation::Delete));
//! assert!(!registry.lookup("audit").unwrap().allows(Operation::Update));
//! assert!(registry.lookup("pets").is_err());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use resource_acl::{AccessPolicy, Operation};
use resource_store::ResourceSchema;

use crate::error::{LayerError, LayerResult};

/// A registered kind: its schema and the operations it enables.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    /// Schema of the kind.
    pub schema: ResourceSchema,
    /// Enabled operations.
    pub policy: AccessPolicy,
}

impl ResourceDescriptor {
    /// Kind name.
    pub fn kind(&self) -> &str {
        &self.schema.kind
    }

    /// Whether the policy enables `operation`.
    pub fn allows(&self, operation: Operation) -> bool {
        self.policy.allows(operation)
    }

    /// Fail with `OperationNotAllowed` unless the policy enables `operation`.
    pub fn require(&self, operation: Operation) -> LayerResult<()> {
        if self.allows(operation) {
            Ok(())
        } else {
            Err(LayerError::OperationNotAllowed {
                kind: self.schema.kind.clone(),
                operation,
            })
        }
    }
}

/// Startup-time builder for a [`ResourceRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    descriptors: BTreeMap<String, ResourceDescriptor>,
}

impl RegistryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind. Registering the same kind again replaces it.
    pub fn register(mut self, schema: ResourceSchema, policy: AccessPolicy) -> Self {
        let kind = schema.kind.clone();
        if self
            .descriptors
            .insert(kind.clone(), ResourceDescriptor { schema, policy })
            .is_some()
        {
            tracing::warn!(kind = %kind, "Resource kind registered twice; keeping the latest");
        }
        self
    }

    /// Freeze the registry.
    pub fn build(self) -> Arc<ResourceRegistry> {
        for descriptor in self.descriptors.values() {
            tracing::info!(
                kind = %descriptor.kind(),
                operations = ?descriptor.policy.enabled(),
                revisioned = descriptor.schema.revisioned,
                "Registered resource kind"
            );
            for relation in &descriptor.schema.relations {
                if !self.descriptors.contains_key(&relation.kind) {
                    tracing::warn!(
                        kind = %descriptor.kind(),
                        relation = %relation.name,
                        target = %relation.kind,
                        "Relation targets an unregistered kind"
                    );
                }
            }
        }

        Arc::new(ResourceRegistry {
            descriptors: self.descriptors,
        })
    }
}

/// Read-only mapping from kind to descriptor.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    descriptors: BTreeMap<String, ResourceDescriptor>,
}

impl ResourceRegistry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Get a descriptor by kind.
    pub fn get(&self, kind: &str) -> Option<&ResourceDescriptor> {
        self.descriptors.get(kind)
    }

    /// Get a descriptor by kind, failing with `UnknownKind`.
    pub fn lookup(&self, kind: &str) -> LayerResult<&ResourceDescriptor> {
        self.get(kind)
            .ok_or_else(|| LayerError::UnknownKind(kind.to_string()))
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether no kinds are registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
