//! Verbs: the named operations a resource exposes through its repository.

use serde::{Deserialize, Serialize};

use crate::registry::schema::Schema;

/// A named operation (read/create/update/delete or any custom rpc) over a
/// resource, carrying its own argument schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verb {
    /// Verb identifier, e.g. `read`, `create`, or an arbitrary rpc name.
    pub id: String,
    /// Name of the request DTO shape the repository consumes for this verb.
    pub dto_name: String,
    /// Schema the verb's arguments are derived from.
    pub schema: Schema,
    /// Whether the verb returns a collection rather than a single entity.
    #[serde(default)]
    pub return_many: bool,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Verb {
    pub fn new(id: impl Into<String>, dto_name: impl Into<String>, schema: Schema) -> Self {
        Self {
            id: id.into(),
            dto_name: dto_name.into(),
            schema,
            return_many: false,
            summary: None,
            description: None,
        }
    }

    pub fn return_many(mut self, return_many: bool) -> Self {
        self.return_many = return_many;
        self
    }

    pub fn is_get(&self) -> bool {
        matches!(self.id.as_str(), "find" | "show" | "read")
    }

    pub fn is_create(&self) -> bool {
        self.id == "create"
    }

    pub fn is_update(&self) -> bool {
        self.id == "update"
    }

    pub fn is_destroy(&self) -> bool {
        self.id == "delete"
    }

    pub fn is_mutation(&self) -> bool {
        self.is_create() || self.is_update() || self.is_destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_predicates() {
        let schema = Schema::new("pet_shop", "pet", vec![]);
        assert!(Verb::new("read", "ReadPetsDto", schema.clone()).is_get());
        assert!(Verb::new("create", "CreatePetDto", schema.clone()).is_mutation());
        assert!(!Verb::new("adopt", "AdoptPetDto", schema).is_mutation());
    }
}
