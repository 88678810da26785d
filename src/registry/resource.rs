//! Resource: a named, schema-backed entity exposed through the API.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::inflect::{camelize, pluralize};
use crate::registry::relationship::Relationship;
use crate::registry::schema::Schema;
use crate::registry::verb::Verb;
use crate::repository::Repository;

/// A resource declaration: its schema, verbs, relationships, capability
/// configuration and the repository that backs it. Built once at startup
/// and read-only for the life of the process.
pub struct Resource {
    pub namespace: String,
    pub name: String,
    pub schema: Schema,
    pub verbs: HashMap<String, Verb>,
    pub relationships: HashMap<String, Relationship>,
    /// Per-protocol exposure configuration keyed by capability name.
    pub capabilities: HashMap<String, Value>,
    pub repository: Arc<dyn Repository>,
    /// Certain resources cannot be paginated, e.g. when an entity
    /// represents a point on a graph.
    pub paginateable: bool,
}

impl Resource {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        schema: Schema,
        repository: Arc<dyn Repository>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            schema,
            verbs: HashMap::new(),
            relationships: HashMap::new(),
            capabilities: HashMap::new(),
            repository,
            paginateable: true,
        }
    }

    pub fn with_verb(mut self, verb: Verb) -> Self {
        self.verbs.insert(verb.id.clone(), verb);
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships
            .insert(relationship.name.clone(), relationship);
        self
    }

    pub fn with_capability(mut self, key: impl Into<String>, config: Value) -> Self {
        self.capabilities.insert(key.into(), config);
        self
    }

    pub fn paginateable(mut self, paginateable: bool) -> Self {
        self.paginateable = paginateable;
        self
    }

    /// Unique identifier: `namespace.name`.
    pub fn identifier(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Pluralized collection name.
    pub fn collection_name(&self) -> String {
        pluralize(&self.name)
    }

    /// Camelized prefix used when naming generated types for this resource.
    pub fn type_prefix(&self) -> String {
        camelize(&format!("{}__{}", self.namespace, self.name))
    }

    pub fn verb(&self, id: &str) -> Option<&Verb> {
        self.verbs.get(id)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    pub fn has_capability(&self, key: &str) -> bool {
        self.capabilities.contains_key(key)
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("identifier", &self.identifier())
            .field("verbs", &self.verbs.keys().collect::<Vec<_>>())
            .field("relationships", &self.relationships.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
