//! The process-wide registry of resource declarations.
//!
//! Built once at startup from declarations and immutable thereafter; every
//! resolution call receives the registry by reference instead of reaching
//! for ambient global state, which keeps testing with alternate registries
//! straightforward.

pub mod relationship;
pub mod resource;
pub mod schema;
pub mod verb;

pub use relationship::{Cardinality, Relationship};
pub use resource::Resource;
pub use schema::{FilterField, Property, PropertyType, Schema};
pub use verb::Verb;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;

/// Owns every resource declaration, keyed by identifier.
#[derive(Debug, Default)]
pub struct Registry {
    resources: HashMap<String, Arc<Resource>>,
}

impl Registry {
    /// Build the registry from declarations. Duplicate identifiers and
    /// relationships pointing at unregistered resources fail here, at boot,
    /// never lazily mid-request.
    pub fn new(resources: Vec<Resource>) -> Result<Self, Error> {
        let mut map = HashMap::with_capacity(resources.len());
        for resource in resources {
            let identifier = resource.identifier();
            if map.insert(identifier.clone(), Arc::new(resource)).is_some() {
                return Err(Error::DuplicateResource(identifier));
            }
        }

        let registry = Self { resources: map };
        registry.validate_relationships()?;
        Ok(registry)
    }

    fn validate_relationships(&self) -> Result<(), Error> {
        for resource in self.resources.values() {
            for relationship in resource.relationships.values() {
                if !self.resources.contains_key(&relationship.resource_id) {
                    return Err(Error::RelationshipResourceNotFound {
                        relationship: relationship.name.clone(),
                        resource: relationship.resource_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, identifier: &str) -> Option<&Arc<Resource>> {
        self.resources.get(identifier)
    }

    /// Fail-fast lookup.
    pub fn expect(&self, identifier: &str) -> Result<&Arc<Resource>, Error> {
        self.get(identifier)
            .ok_or_else(|| Error::ResourceNotFound(identifier.to_string()))
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.resources.values()
    }

    /// Every resource exposing the given capability.
    pub fn with_capability(&self, key: &str) -> Vec<&Arc<Resource>> {
        self.resources
            .values()
            .filter(|resource| resource.has_capability(key))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    use crate::repository::MemoryRepository;

    fn resource(namespace: &str, name: &str) -> Resource {
        let schema = Schema::new(namespace, name, vec![]);
        let repository = Arc::new(MemoryRepository::new(schema.clone(), vec![]));
        Resource::new(namespace, name, schema, repository)
    }

    #[test]
    fn test_duplicate_identifier_fails_eagerly() {
        let result = Registry::new(vec![resource("pet_shop", "pet"), resource("pet_shop", "pet")]);
        assert_matches!(result, Err(Error::DuplicateResource(id)) if id == "pet_shop.pet");
    }

    #[test]
    fn test_dangling_relationship_fails_eagerly() {
        let dangling = resource("pet_shop", "pet").with_relationship(Relationship::new(
            "owner",
            "pet_shop.owner",
            "owner_id",
            Cardinality::BelongsTo,
        ));
        assert_matches!(
            Registry::new(vec![dangling]),
            Err(Error::RelationshipResourceNotFound { .. })
        );
    }

    #[test]
    fn test_lookup_and_capability_filter() {
        let registry = Registry::new(vec![
            resource("pet_shop", "pet").with_capability("graphql", json!({})),
            resource("pet_shop", "owner"),
        ])
        .unwrap();

        assert!(registry.get("pet_shop.pet").is_some());
        assert_matches!(registry.expect("pet_shop.cat"), Err(Error::ResourceNotFound(_)));
        assert_eq!(registry.with_capability("graphql").len(), 1);
    }
}
