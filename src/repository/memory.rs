//! A lightweight in-memory repository.
//!
//! Useful for tests and prototyping: it honors the batched read DTO
//! convention (a pluralized key carrying a list matches the singular entity
//! field by membership), applies store-pushable filter conditions, sorting
//! and both pagination strategies, and counts its `read` calls so tests can
//! assert batching behavior.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::applier::{compare, matches_condition};
use crate::context::{Context, Direction, Pagination, SortOrder};
use crate::error::RepositoryError;
use crate::inflect::singularize;
use crate::pagination::{PageInfo, encode_cursor, key_string};
use crate::registry::schema::Schema;
use crate::repository::{Dto, Projection, ReadResult, Repository};
use crate::serializer::Serializer;

/// In-memory repository over a fixed set of entity objects.
pub struct MemoryRepository {
    rows: Vec<Value>,
    primary_key: String,
    serializer: Serializer,
    reads: AtomicUsize,
}

impl MemoryRepository {
    pub fn new(schema: Schema, rows: Vec<Value>) -> Self {
        Self {
            rows,
            primary_key: "id".to_string(),
            serializer: Serializer::new(schema),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Number of `read` calls issued against this repository.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn matches_dto(&self, entity: &Value, dto: &Dto) -> bool {
        let Some(object) = entity.as_object() else {
            return false;
        };

        dto.iter().all(|(key, expected)| {
            // A pluralized DTO key carrying a list matches the singular
            // entity field by membership; anything else is an equality
            // lookup on the named field.
            let field = if object.contains_key(key) {
                key.clone()
            } else {
                singularize(key)
            };
            let actual = object.get(&field).unwrap_or(&Value::Null);

            match expected {
                Value::Array(candidates) => candidates
                    .iter()
                    .any(|candidate| key_string(candidate) == key_string(actual)),
                scalar => key_string(scalar) == key_string(actual),
            }
        })
    }

    fn apply_sort(&self, rows: &mut [Value], sort: &[(String, SortOrder)]) {
        for (field, order) in sort.iter().rev() {
            rows.sort_by(|a, b| {
                let left = a.get(field).unwrap_or(&Value::Null);
                let right = b.get(field).unwrap_or(&Value::Null);
                let ordering = compare(left, right).unwrap_or(std::cmp::Ordering::Equal);
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }
    }

    fn paginate(&self, rows: Vec<Value>, context: &Context) -> (Vec<Value>, PageInfo) {
        let total = rows.len();

        let (start, end) = match context.pagination() {
            None => (0, total),
            Some(Pagination::Offset { page, page_size }) => {
                let page = page.max(1) as usize;
                let start = (page - 1) * page_size as usize;
                (start.min(total), (start + page_size as usize).min(total))
            }
            Some(Pagination::Cursor {
                after_id,
                before_id,
                page_size,
                direction,
            }) => {
                let position = |id: &str| {
                    rows.iter().position(|row| {
                        key_string(row.get(&self.primary_key).unwrap_or(&Value::Null)) == id
                    })
                };

                match direction {
                    Direction::Forward => {
                        let start = after_id
                            .as_deref()
                            .and_then(&position)
                            .map_or(0, |index| index + 1);
                        (start.min(total), (start + page_size as usize).min(total))
                    }
                    Direction::Backward => {
                        let end = before_id.as_deref().and_then(&position).unwrap_or(total);
                        (end.saturating_sub(page_size as usize), end.min(total))
                    }
                }
            }
        };

        let cursor_at = |index: usize| {
            rows.get(index).map(|row| {
                encode_cursor(&key_string(
                    row.get(&self.primary_key).unwrap_or(&Value::Null),
                ))
            })
        };

        let page_info = PageInfo {
            has_next_page: end < total,
            has_previous_page: start > 0,
            start_cursor: if start < end { cursor_at(start) } else { None },
            end_cursor: if start < end { cursor_at(end - 1) } else { None },
            total_count: Some(total as i64),
        };

        (rows[start..end].to_vec(), page_info)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn read(
        &self,
        dto: &Dto,
        context: Option<&Context>,
    ) -> Result<ReadResult, RepositoryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let mut rows: Vec<Value> = self
            .rows
            .iter()
            .filter(|entity| self.matches_dto(entity, dto))
            .cloned()
            .collect();

        let Some(context) = context else {
            let total = rows.len() as i64;
            return Ok(ReadResult::new(rows).with_page_info(PageInfo {
                total_count: Some(total),
                ..PageInfo::default()
            }));
        };

        if let Some(filter) = &context.filter {
            rows.retain(|entity| {
                let Some(object) = entity.as_object() else {
                    return false;
                };
                filter
                    .pushable_conditions()
                    .all(|condition| matches_condition(object, condition))
            });
        }

        self.apply_sort(&mut rows, &context.sort);
        let (rows, page_info) = self.paginate(rows, context);

        Ok(ReadResult::new(rows).with_page_info(page_info))
    }

    fn serialize(&self, entity: &Value) -> Projection {
        self.serializer.serialize(entity, &BTreeSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::context::{RawParams, build_context};
    use crate::registry::schema::{Property, PropertyType};

    fn schema() -> Schema {
        Schema::new(
            "pet_shop",
            "pet",
            vec![
                Property::scalar("id", PropertyType::String).resolvable(true),
                Property::scalar("owner_id", PropertyType::Integer).resolvable(true),
                Property::scalar("name", PropertyType::String).resolvable(true),
            ],
        )
    }

    fn repo() -> MemoryRepository {
        MemoryRepository::new(
            schema(),
            vec![
                json!({ "id": "1", "owner_id": 1, "name": "Rex" }),
                json!({ "id": "2", "owner_id": 2, "name": "Milo" }),
                json!({ "id": "3", "owner_id": 1, "name": "Luna" }),
            ],
        )
    }

    #[tokio::test]
    async fn test_pluralized_dto_key_matches_by_membership() {
        let repo = repo();
        let dto = Dto::from_iter([("owner_ids".to_string(), json!([1]))]);
        let result = repo.read(&dto, None).await.unwrap();
        assert_eq!(result.entities.len(), 2);
        assert_eq!(repo.read_count(), 1);
    }

    #[tokio::test]
    async fn test_scalar_dto_key_matches_by_equality() {
        let repo = repo();
        let dto = Dto::from_iter([("name".to_string(), json!("Milo"))]);
        let result = repo.read(&dto, None).await.unwrap();
        assert_eq!(result.entities.len(), 1);
    }

    #[tokio::test]
    async fn test_offset_pagination_metadata() {
        let repo = repo();
        let context = build_context(
            &RawParams {
                first: Some(2),
                offset_page: Some(1),
                ..RawParams::default()
            },
            &schema(),
        )
        .unwrap();

        let result = repo.read(&Dto::new(), Some(&context)).await.unwrap();
        assert_eq!(result.entities.len(), 2);
        assert_eq!(result.page_info.total_count, Some(3));
        assert!(result.page_info.has_next_page);
        assert!(!result.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn test_cursor_pagination_starts_after_cursor() {
        let repo = repo();
        let context = build_context(
            &RawParams {
                first: Some(2),
                after: Some(encode_cursor("1")),
                ..RawParams::default()
            },
            &schema(),
        )
        .unwrap();

        let result = repo.read(&Dto::new(), Some(&context)).await.unwrap();
        let ids: Vec<_> = result
            .entities
            .iter()
            .map(|entity| entity.get("id").unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["2", "3"]);
        assert!(result.page_info.has_previous_page);
        assert!(!result.page_info.has_next_page);
    }
}
