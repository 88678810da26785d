//! Batched relationship resolution.
//!
//! Given a relationship and a batch of parent keys, the resolver issues one
//! read against the target resource's repository and reshapes the flat
//! result back into the per-parent shape the cardinality requires. Sibling
//! requests for the same relationship and target resource, discovered
//! anywhere in a query tree during one request, are coalesced through
//! [`RelationshipLoader`] so no more than one repository call is made per
//! (relationship, target resource) per request, regardless of how many
//! parent rows reference it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_graphql::dataloader::{DataLoader, Loader};

use crate::config::EngineConfig;
use crate::context::Context;
use crate::error::Error;
use crate::pagination::PageInfo;
use crate::registry::Registry;
use crate::registry::relationship::Relationship;
use crate::repository::{Dto, Key, Loaded, Projection};

/// Resolve `relationship` for a batch of parent keys.
///
/// Issues exactly one repository read. The output is aligned with
/// `parent_keys`: same length, same order, duplicates included. Unmatched
/// keys yield `None`/empty per the cardinality. A failed read surfaces the
/// repository's error to every consumer of the batch.
pub async fn resolve_relationship(
    registry: &Registry,
    relationship: &Relationship,
    parent_keys: &[Key],
    args: &Dto,
) -> Result<Vec<Loaded>, Error> {
    let (rows, _) = read_batch(registry, relationship, parent_keys, args, None).await?;
    Ok(relationship
        .kind
        .shape_result(&rows, parent_keys, relationship))
}

/// Resolve `relationship` as a connection: the same single batched read,
/// with the normalized `context` passed through to the repository, and the
/// store's page metadata handed back for connection rendering.
pub async fn resolve_connection(
    registry: &Registry,
    relationship: &Relationship,
    parent_keys: &[Key],
    args: &Dto,
    context: &Context,
) -> Result<(Vec<Loaded>, PageInfo), Error> {
    let (rows, page_info) =
        read_batch(registry, relationship, parent_keys, args, Some(context)).await?;
    Ok((
        relationship
            .kind
            .shape_result(&rows, parent_keys, relationship),
        page_info,
    ))
}

/// Extract the batch keys for `relationship` from already-serialized parent
/// rows, using the parent-side accessor the cardinality dictates.
pub fn parent_keys(rows: &[Projection], relationship: &Relationship) -> Vec<Key> {
    let accessor = relationship.reference_id();
    rows.iter()
        .map(|row| {
            Key::new(
                row.get(accessor)
                    .cloned()
                    .unwrap_or(serde_json::Value::Null),
            )
        })
        .collect()
}

/// One independent relationship batch to dispatch.
pub struct Branch {
    pub relationship: Relationship,
    pub parent_keys: Vec<Key>,
    pub args: Dto,
}

/// Dispatch several independent relationship batches concurrently.
///
/// Results line up with the input branches. Each branch fails
/// independently: one failing relationship never aborts its siblings.
pub async fn resolve_branches(
    registry: &Registry,
    branches: &[Branch],
) -> Vec<Result<Vec<Loaded>, Error>> {
    futures::future::join_all(branches.iter().map(|branch| {
        resolve_relationship(
            registry,
            &branch.relationship,
            &branch.parent_keys,
            &branch.args,
        )
    }))
    .await
}

/// Build the read DTO and issue the single repository call for a batch.
async fn read_batch(
    registry: &Registry,
    relationship: &Relationship,
    parent_keys: &[Key],
    args: &Dto,
    context: Option<&Context>,
) -> Result<(Vec<Projection>, PageInfo), Error> {
    let target = registry.expect(&relationship.resource_id)?;

    let unique = dedupe(parent_keys);

    let mut dto = relationship.fixed_dto_params.clone();
    for (name, value) in args {
        if !relationship.should_skip_argument(name) {
            dto.insert(name.clone(), value.clone());
        }
    }
    relationship.kind.prepare_dto(&mut dto, &unique, relationship);

    tracing::debug!(
        relationship = %relationship.name,
        resource = %relationship.resource_id,
        parents = parent_keys.len(),
        batched = unique.len(),
        "dispatching relationship batch"
    );

    let read = target.repository.read(&dto, context).await?;
    let rows = read
        .entities
        .iter()
        .map(|entity| target.repository.serialize(entity))
        .collect();
    Ok((rows, read.page_info))
}

/// Deduplicate keys while preserving first-seen order.
fn dedupe(keys: &[Key]) -> Vec<Key> {
    let mut seen = HashSet::new();
    keys.iter()
        .filter(|key| seen.insert(key.canonical()))
        .cloned()
        .collect()
}

/// Per-request coalescing loader for one (relationship, target resource)
/// pair.
///
/// Register one `DataLoader<RelationshipLoader>` per relationship in
/// request scope; `load_one` calls from every branch of the query tree
/// collapse into a single batched repository read. The registry and type
/// model are read-only, so a cancelled request can simply drop in-flight
/// results.
pub struct RelationshipLoader {
    registry: Arc<Registry>,
    relationship: Relationship,
    args: Dto,
}

impl RelationshipLoader {
    pub fn new(registry: Arc<Registry>, relationship: Relationship, args: Dto) -> Self {
        Self {
            registry,
            relationship,
            args,
        }
    }
}

impl Loader<Key> for RelationshipLoader {
    type Value = Loaded;
    type Error = Arc<Error>;

    async fn load(&self, keys: &[Key]) -> Result<HashMap<Key, Self::Value>, Self::Error> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let shaped = resolve_relationship(&self.registry, &self.relationship, keys, &self.args)
            .await
            .map_err(Arc::new)?;

        Ok(keys.iter().cloned().zip(shaped).collect())
    }
}

/// Build a request-scoped dataloader for `relationship`, applying the
/// engine's batching knobs.
pub fn dataloader(
    registry: Arc<Registry>,
    relationship: Relationship,
    args: Dto,
    config: &EngineConfig,
) -> DataLoader<RelationshipLoader> {
    DataLoader::new(
        RelationshipLoader::new(registry, relationship, args),
        tokio::spawn,
    )
    .delay(Duration::from_millis(config.dataloader_delay_ms))
    .max_batch_size(config.max_batch_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::registry::relationship::Cardinality;
    use crate::registry::resource::Resource;
    use crate::registry::schema::{Property, PropertyType, Schema};
    use crate::repository::MemoryRepository;

    fn owner_schema() -> Schema {
        Schema::new(
            "pet_shop",
            "owner",
            vec![
                Property::scalar("id", PropertyType::Integer).resolvable(true),
                Property::scalar("name", PropertyType::String).resolvable(true),
            ],
        )
    }

    fn pet_schema() -> Schema {
        Schema::new(
            "pet_shop",
            "pet",
            vec![
                Property::scalar("id", PropertyType::String).resolvable(true),
                Property::scalar("owner_id", PropertyType::Integer).resolvable(true),
                Property::scalar("name", PropertyType::String).resolvable(true),
                Property::scalar("kind", PropertyType::String).resolvable(true),
            ],
        )
    }

    fn registry_with_owners() -> (Registry, Arc<MemoryRepository>) {
        let owners = Arc::new(MemoryRepository::new(
            owner_schema(),
            vec![
                json!({ "id": 1, "name": "Alice" }),
                json!({ "id": 2, "name": "Bob" }),
            ],
        ));
        let pets = Arc::new(MemoryRepository::new(
            pet_schema(),
            vec![
                json!({ "id": "p1", "owner_id": 1, "name": "Rex", "kind": "dog" }),
                json!({ "id": "p2", "owner_id": 2, "name": "Milo", "kind": "cat" }),
                json!({ "id": "p3", "owner_id": 1, "name": "Luna", "kind": "dog" }),
            ],
        ));

        let registry = Registry::new(vec![
            Resource::new("pet_shop", "owner", owner_schema(), owners.clone()),
            Resource::new("pet_shop", "pet", pet_schema(), pets),
        ])
        .unwrap();

        (registry, owners)
    }

    fn belongs_to_owner() -> Relationship {
        Relationship::new("owner", "pet_shop.owner", "owner_id", Cardinality::BelongsTo)
    }

    #[tokio::test]
    async fn test_belongs_to_preserves_order_and_duplicates() {
        let (registry, owners) = registry_with_owners();
        let keys = [Key::from(1), Key::from(2), Key::from(1)];

        let resolved =
            resolve_relationship(&registry, &belongs_to_owner(), &keys, &Dto::new())
                .await
                .unwrap();

        let names: Vec<_> = resolved
            .iter()
            .map(|loaded| match loaded {
                Loaded::One(Some(row)) => row.get("name").unwrap().as_str().unwrap().to_string(),
                other => panic!("expected a row, got {other:?}"),
            })
            .collect();
        assert_eq!(names, vec!["Alice", "Bob", "Alice"]);
        assert_eq!(owners.read_count(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_keys_shape_per_cardinality() {
        let (registry, _) = registry_with_owners();

        let resolved = resolve_relationship(
            &registry,
            &belongs_to_owner(),
            &[Key::from(99)],
            &Dto::new(),
        )
        .await
        .unwrap();
        assert_eq!(resolved, vec![Loaded::One(None)]);

        let has_many = Relationship::new("pets", "pet_shop.pet", "owner_id", Cardinality::HasMany);
        let resolved = resolve_relationship(&registry, &has_many, &[Key::from(99)], &Dto::new())
            .await
            .unwrap();
        assert_eq!(resolved, vec![Loaded::Many(vec![])]);
    }

    #[tokio::test]
    async fn test_skipped_and_fixed_args_compose_the_dto() {
        let (registry, _) = registry_with_owners();
        let relationship = Relationship::new(
            "dogs",
            "pet_shop.pet",
            "owner_id",
            Cardinality::HasMany,
        )
        .fixed_dto_params(Dto::from_iter([("kind".to_string(), json!("dog"))]));

        // The caller re-supplying the batch key or a fixed param is ignored.
        let args = Dto::from_iter([
            ("owner_ids".to_string(), json!([7, 8, 9])),
            ("kind".to_string(), json!("cat")),
        ]);

        let resolved =
            resolve_relationship(&registry, &relationship, &[Key::from(1)], &args)
                .await
                .unwrap();
        let Loaded::Many(rows) = &resolved[0] else {
            panic!("expected many");
        };
        let names: Vec<_> = rows
            .iter()
            .map(|row| row.get("name").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Rex", "Luna"]);
    }

    #[tokio::test]
    async fn test_has_many_through_membership() {
        let (registry, _) = registry_with_owners();
        let relationship = Relationship::new(
            "favorites",
            "pet_shop.owner",
            "favorite_ids",
            Cardinality::HasManyThrough,
        );

        let keys = [Key::new(json!([1, 2])), Key::new(json!([2]))];
        let resolved = resolve_relationship(&registry, &relationship, &keys, &Dto::new())
            .await
            .unwrap();

        let Loaded::Many(first) = &resolved[0] else {
            panic!("expected many");
        };
        let Loaded::Many(second) = &resolved[1] else {
            panic!("expected many");
        };
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].get("name"), Some(&json!("Bob")));
    }

    #[tokio::test]
    async fn test_branches_fail_independently() {
        let (registry, _) = registry_with_owners();
        let good = Branch {
            relationship: belongs_to_owner(),
            parent_keys: vec![Key::from(1)],
            args: Dto::new(),
        };
        // Constructed directly so registry validation cannot catch it; the
        // failure must stay contained to this branch.
        let bad = Branch {
            relationship: Relationship::new(
                "ghost",
                "pet_shop.ghost",
                "ghost_id",
                Cardinality::HasOne,
            ),
            parent_keys: vec![Key::from(1)],
            args: Dto::new(),
        };

        let results = resolve_branches(&registry, &[good, bad]).await;
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[tokio::test]
    async fn test_dataloader_coalesces_sibling_requests() {
        let (registry, owners) = registry_with_owners();
        let loader = dataloader(
            Arc::new(registry),
            belongs_to_owner(),
            Dto::new(),
            &EngineConfig::default(),
        );

        let (first, second, third) = tokio::join!(
            loader.load_one(Key::from(1)),
            loader.load_one(Key::from(2)),
            loader.load_one(Key::from(1)),
        );

        let name = |loaded: Option<Loaded>| match loaded {
            Some(Loaded::One(Some(row))) => row.get("name").unwrap().as_str().unwrap().to_string(),
            other => panic!("expected a row, got {other:?}"),
        };
        assert_eq!(name(first.unwrap()), "Alice");
        assert_eq!(name(second.unwrap()), "Bob");
        assert_eq!(name(third.unwrap()), "Alice");
        assert_eq!(owners.read_count(), 1);
    }
}
