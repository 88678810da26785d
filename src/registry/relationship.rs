//! Relationship model: typed joins between two resources' collections.
//!
//! The cardinality is a strategy with four variants rather than state
//! spread across callers: each variant knows how to prepare the batched
//! read DTO, which parent-side accessor supplies the batch keys, how to
//! reshape the flat batch result back into per-parent values, and which
//! caller arguments it already controls.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::inflect::pluralize;
use crate::pagination::key_string;
use crate::repository::{Dto, Key, Loaded, Projection};

/// How one resource's collection relates to another's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// The join field lives on the destination entity; one row per parent.
    HasOne,
    /// The join field lives on the destination entity; many rows per parent.
    HasMany,
    /// The join field lives on the origin entity.
    BelongsTo,
    /// The origin entity holds an array of target ids.
    HasManyThrough,
}

/// A declared join between two resources. Declared once at boot and never
/// mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub name: String,
    /// Identifier of the target resource in the registry.
    pub resource_id: String,
    /// Join key on the side the cardinality dictates.
    pub field: String,
    /// Join key on the other side.
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    pub kind: Cardinality,
    #[serde(default)]
    pub optional: bool,
    /// Constant filter values always merged into the derived read.
    #[serde(default)]
    pub fixed_dto_params: Map<String, Value>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

impl Relationship {
    pub fn new(
        name: impl Into<String>,
        resource_id: impl Into<String>,
        field: impl Into<String>,
        kind: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            resource_id: resource_id.into(),
            field: field.into(),
            primary_key: default_primary_key(),
            kind,
            optional: false,
            fixed_dto_params: Map::new(),
        }
    }

    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn fixed_dto_params(mut self, params: Map<String, Value>) -> Self {
        self.fixed_dto_params = params;
        self
    }

    /// The parent-side accessor whose values become the batch keys.
    pub fn reference_id(&self) -> &str {
        self.kind.reference_id(self)
    }

    /// Whether a caller-supplied argument duplicates a key the batcher
    /// already controls: the pluralized join key it injects, or a fixed DTO
    /// parameter.
    pub fn should_skip_argument(&self, argument: &str) -> bool {
        self.kind.skip_argument(argument, self) || self.fixed_dto_params.contains_key(argument)
    }
}

impl Cardinality {
    /// Whether the relationship yields a collection per parent.
    pub fn many(&self) -> bool {
        matches!(self, Cardinality::HasMany | Cardinality::HasManyThrough)
    }

    /// The parent-side accessor whose values become the batch keys.
    pub fn reference_id<'a>(&self, relationship: &'a Relationship) -> &'a str {
        match self {
            Cardinality::HasOne | Cardinality::HasMany => &relationship.primary_key,
            Cardinality::BelongsTo | Cardinality::HasManyThrough => &relationship.field,
        }
    }

    /// The DTO key the deduplicated batch key list is injected under.
    pub fn batch_key(&self, relationship: &Relationship) -> String {
        match self {
            Cardinality::HasOne | Cardinality::HasMany => pluralize(&relationship.field),
            Cardinality::BelongsTo => pluralize(&relationship.primary_key),
            Cardinality::HasManyThrough => "ids".to_string(),
        }
    }

    /// Merge the batch key list into the read DTO under the pluralized join
    /// key. Composite keys are flattened and deduplicated first.
    pub fn prepare_dto(&self, dto: &mut Dto, keys: &[Key], relationship: &Relationship) {
        let values = match self {
            Cardinality::HasManyThrough => {
                let mut seen = HashSet::new();
                keys.iter()
                    .flat_map(|key| key.scalars())
                    .filter(|value| seen.insert(key_string(value)))
                    .cloned()
                    .collect()
            }
            _ => keys
                .iter()
                .filter(|key| !key.is_null())
                .map(|key| key.value().clone())
                .collect(),
        };
        dto.insert(self.batch_key(relationship), Value::Array(values));
    }

    /// Reshape the flat batch result into the per-parent shape required by
    /// this cardinality. Output length and order match `keys`, duplicates
    /// included.
    pub fn shape_result(
        &self,
        rows: &[Projection],
        keys: &[Key],
        relationship: &Relationship,
    ) -> Vec<Loaded> {
        match self {
            Cardinality::HasOne => {
                let indexed = index_by(rows, &relationship.field);
                keys.iter()
                    .map(|key| Loaded::One(indexed.get(&key.canonical()).map(|&row| row.clone())))
                    .collect()
            }
            Cardinality::BelongsTo => {
                let indexed = index_by(rows, &relationship.primary_key);
                keys.iter()
                    .map(|key| Loaded::One(indexed.get(&key.canonical()).map(|&row| row.clone())))
                    .collect()
            }
            Cardinality::HasMany => {
                let grouped = group_by(rows, &relationship.field);
                keys.iter()
                    .map(|key| {
                        Loaded::Many(
                            grouped
                                .get(&key.canonical())
                                .map(|group| group.iter().map(|&row| row.clone()).collect())
                                .unwrap_or_default(),
                        )
                    })
                    .collect()
            }
            Cardinality::HasManyThrough => keys
                .iter()
                .map(|key| {
                    Loaded::Many(
                        rows.iter()
                            .filter(|row| {
                                key.contains(row.get("id").unwrap_or(&Value::Null))
                            })
                            .cloned()
                            .collect(),
                    )
                })
                .collect(),
        }
    }

    /// Whether `argument` is the DTO key this cardinality injects itself.
    pub fn skip_argument(&self, argument: &str, relationship: &Relationship) -> bool {
        argument == self.batch_key(relationship)
    }
}

fn index_by<'a>(
    rows: &'a [Projection],
    field: &str,
) -> std::collections::HashMap<String, &'a Projection> {
    // Last row wins on duplicate join-key values, matching index semantics.
    rows.iter()
        .map(|row| (key_string(row.get(field).unwrap_or(&Value::Null)), row))
        .collect()
}

fn group_by<'a>(
    rows: &'a [Projection],
    field: &str,
) -> std::collections::HashMap<String, Vec<&'a Projection>> {
    let mut grouped: std::collections::HashMap<String, Vec<&Projection>> =
        std::collections::HashMap::new();
    for row in rows {
        grouped
            .entry(key_string(row.get(field).unwrap_or(&Value::Null)))
            .or_default()
            .push(row);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Projection {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn owner_rel(kind: Cardinality) -> Relationship {
        Relationship::new("owner", "pet_shop.owner", "owner_id", kind)
    }

    #[test]
    fn test_prepare_dto_injects_pluralized_field() {
        let rel = owner_rel(Cardinality::HasMany);
        let mut dto = Dto::new();
        rel.kind
            .prepare_dto(&mut dto, &[Key::from(1), Key::from(2)], &rel);
        assert_eq!(dto.get("owner_ids"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_prepare_dto_belongs_to_uses_primary_key() {
        let rel = owner_rel(Cardinality::BelongsTo);
        let mut dto = Dto::new();
        rel.kind.prepare_dto(&mut dto, &[Key::from("a")], &rel);
        assert_eq!(dto.get("ids"), Some(&json!(["a"])));
    }

    #[test]
    fn test_prepare_dto_through_flattens_and_dedupes() {
        let rel = owner_rel(Cardinality::HasManyThrough);
        let mut dto = Dto::new();
        let keys = [Key::new(json!([1, 2])), Key::new(json!([2, null, 3]))];
        rel.kind.prepare_dto(&mut dto, &keys, &rel);
        assert_eq!(dto.get("ids"), Some(&json!([1, 2, 3])));
    }

    #[test]
    fn test_shape_has_one_unmatched_is_none() {
        let rel = owner_rel(Cardinality::HasOne);
        let rows = [row(&[("owner_id", json!(1)), ("name", json!("Rex"))])];
        let shaped = rel
            .kind
            .shape_result(&rows, &[Key::from(1), Key::from(9)], &rel);
        assert_eq!(shaped.len(), 2);
        assert_eq!(shaped[0], Loaded::One(Some(rows[0].clone())));
        assert_eq!(shaped[1], Loaded::One(None));
    }

    #[test]
    fn test_shape_has_many_groups_and_defaults_empty() {
        let rel = owner_rel(Cardinality::HasMany);
        let rows = [
            row(&[("owner_id", json!(1)), ("name", json!("Rex"))]),
            row(&[("owner_id", json!(1)), ("name", json!("Milo"))]),
        ];
        let shaped = rel
            .kind
            .shape_result(&rows, &[Key::from(1), Key::from(2)], &rel);
        assert_eq!(shaped[0], Loaded::Many(rows.to_vec()));
        assert_eq!(shaped[1], Loaded::Many(vec![]));
    }

    #[test]
    fn test_shape_through_filters_by_membership() {
        let rel = owner_rel(Cardinality::HasManyThrough);
        let rows = [
            row(&[("id", json!(1)), ("name", json!("a"))]),
            row(&[("id", json!(2)), ("name", json!("b"))]),
            row(&[("id", json!(3)), ("name", json!("c"))]),
        ];
        let keys = [Key::new(json!([1, 3])), Key::new(json!([]))];
        let shaped = rel.kind.shape_result(&rows, &keys, &rel);
        assert_eq!(shaped[0], Loaded::Many(vec![rows[0].clone(), rows[2].clone()]));
        assert_eq!(shaped[1], Loaded::Many(vec![]));
    }

    #[test]
    fn test_should_skip_argument() {
        let rel = owner_rel(Cardinality::HasMany).fixed_dto_params(Map::from_iter([(
            "kind".to_string(),
            json!("dog"),
        )]));
        assert!(rel.should_skip_argument("owner_ids"));
        assert!(rel.should_skip_argument("kind"));
        assert!(!rel.should_skip_argument("owner_id"));
        assert!(!rel.should_skip_argument("name"));
    }

    #[test]
    fn test_reference_id_per_cardinality() {
        assert_eq!(owner_rel(Cardinality::HasOne).reference_id(), "id");
        assert_eq!(owner_rel(Cardinality::HasMany).reference_id(), "id");
        assert_eq!(owner_rel(Cardinality::BelongsTo).reference_id(), "owner_id");
        assert_eq!(
            owner_rel(Cardinality::HasManyThrough).reference_id(),
            "owner_id"
        );
    }
}
