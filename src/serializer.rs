//! Schema-driven projection of opaque entities.
//!
//! Only the accessors the declared schema names are ever read from an
//! entity; everything else stays opaque to the engine.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::registry::schema::Schema;
use crate::repository::Projection;

/// Projects opaque entities into the declared schema's fields, honoring
/// per-property resolvers and serialization-group visibility.
#[derive(Debug, Clone)]
pub struct Serializer {
    schema: Schema,
}

impl Serializer {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    /// Serialize an entity for the requested serialization groups.
    ///
    /// Properties tagged with groups are emitted only when a requested
    /// group matches; untagged properties always serialize. A property
    /// behind a multi-target "forward" resolver has no single physical
    /// accessor and is skipped with a warning rather than failing the
    /// projection.
    pub fn serialize(&self, entity: &Value, groups: &BTreeSet<String>) -> Projection {
        let source = entity.as_object();
        let mut output = Map::new();

        for property in &self.schema.properties {
            if !property.visible_for(groups) {
                continue;
            }

            let Some(accessor) = property.single_resolver_target() else {
                tracing::warn!(
                    property = %property.name,
                    schema = %self.schema.identifier(),
                    "multi-target resolver has no single accessor, skipping field"
                );
                continue;
            };

            let value = source
                .and_then(|object| object.get(accessor))
                .cloned()
                .unwrap_or(Value::Null);
            output.insert(property.name.clone(), value);
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    use crate::registry::schema::{Property, PropertyType};

    fn schema() -> Schema {
        Schema::new(
            "pet_shop",
            "pet",
            vec![
                Property::scalar("id", PropertyType::String),
                Property::scalar("name", PropertyType::String).resolver(BTreeMap::from([(
                    "fn".to_string(),
                    "full_name".to_string(),
                )])),
                Property::scalar("ssn", PropertyType::String)
                    .serialization_groups(BTreeSet::from(["private".to_string()])),
                Property::scalar("display", PropertyType::String).resolver(BTreeMap::from([
                    ("a".to_string(), "first".to_string()),
                    ("b".to_string(), "last".to_string()),
                ])),
            ],
        )
    }

    #[test]
    fn test_serialize_follows_resolver_and_defaults_null() {
        let serializer = Serializer::new(schema());
        let entity = json!({ "id": "1", "full_name": "Rex", "ssn": "xyz" });
        let projected = serializer.serialize(&entity, &BTreeSet::new());

        assert_eq!(projected.get("id"), Some(&json!("1")));
        assert_eq!(projected.get("name"), Some(&json!("Rex")));
        // Tagged property without a matching group stays hidden.
        assert_eq!(projected.get("ssn"), None);
        // Multi-target resolver degrades to a skipped field.
        assert_eq!(projected.get("display"), None);
    }

    #[test]
    fn test_serialize_with_matching_group() {
        let serializer = Serializer::new(schema());
        let entity = json!({ "id": "1", "full_name": "Rex", "ssn": "xyz" });
        let groups = BTreeSet::from(["private".to_string()]);
        let projected = serializer.serialize(&entity, &groups);
        assert_eq!(projected.get("ssn"), Some(&json!("xyz")));
    }
}
