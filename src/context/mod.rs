//! Pagination/filter context: converts raw client parameters into the
//! normalized per-request [`Context`] every downstream stage consumes.
//!
//! The builder decides the offset-vs-cursor strategy, clamps page sizes,
//! resolves sort/filter fields against the schema's resolver map and splits
//! filter conditions into store-pushable vs in-memory once, at build time,
//! so later stages never re-inspect the schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::pagination::decode_cursor;
use crate::registry::schema::Schema;

/// Hard cap on page sizes. Oversized requests are clamped, never rejected.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Direction of traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Sort order for a resolved sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// The raw `(field, order)` sort request, prior to schema resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortParam {
    pub field: String,
    pub order: SortOrder,
}

/// Comparators understood by the filter subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Eq,
    NotEq,
    Gt,
    Lt,
    Lteq,
    Gteq,
    Contains,
    StartsWith,
    EndsWith,
    In,
    Between,
}

impl Comparator {
    pub fn parse(input: &str) -> Option<Self> {
        Some(match input {
            "eq" => Self::Eq,
            "not_eq" => Self::NotEq,
            "gt" => Self::Gt,
            "lt" => Self::Lt,
            "lteq" => Self::Lteq,
            "gteq" => Self::Gteq,
            "contains" => Self::Contains,
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            "in" => Self::In,
            "between" => Self::Between,
            _ => return None,
        })
    }
}

/// One filter condition, already resolved against the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// Physical field the condition targets.
    pub field: String,
    pub comparator: Comparator,
    pub value: Value,
    /// The store cannot evaluate this condition; it is re-applied in memory
    /// after the read.
    pub in_memory: bool,
}

/// The filter intent carried on a context. Top-level conditions AND
/// together; each `or` group passes when any member matches and is AND'ed
/// with the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<FilterCondition>,
    pub or_groups: Vec<Vec<FilterCondition>>,
}

impl Filter {
    /// Whether any condition anywhere is flagged in-memory.
    pub fn any_in_memory(&self) -> bool {
        self.conditions.iter().any(|condition| condition.in_memory)
            || self
                .or_groups
                .iter()
                .flatten()
                .any(|condition| condition.in_memory)
    }

    /// Top-level conditions the store can evaluate.
    pub fn pushable_conditions(&self) -> impl Iterator<Item = &FilterCondition> {
        self.conditions.iter().filter(|condition| !condition.in_memory)
    }

    /// Top-level conditions that must be applied post-fetch.
    pub fn in_memory_conditions(&self) -> impl Iterator<Item = &FilterCondition> {
        self.conditions.iter().filter(|condition| condition.in_memory)
    }
}

/// Raw filter input: a comparator map per field, plus optional OR groups of
/// the same shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterInput {
    #[serde(default)]
    pub fields: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(default, rename = "or")]
    pub or_groups: Vec<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl FilterInput {
    /// Add a condition on `field`.
    pub fn field(mut self, field: impl Into<String>, comparator: &str, value: Value) -> Self {
        self.fields
            .entry(field.into())
            .or_default()
            .insert(comparator.to_string(), value);
        self
    }

    /// Add an OR group of conditions.
    pub fn or_group(mut self, group: BTreeMap<String, BTreeMap<String, Value>>) -> Self {
        self.or_groups.push(group);
        self
    }
}

/// Raw request parameters as received from a transport layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawParams {
    /// Page size when paginating forwards.
    pub first: Option<u32>,
    /// Page size when paginating backwards.
    pub last: Option<u32>,
    /// Opaque cursor to paginate after.
    pub after: Option<String>,
    /// Opaque cursor to paginate before.
    pub before: Option<String>,
    /// Offset page number; mutually exclusive with cursors.
    pub offset_page: Option<u32>,
    pub sort: Option<SortParam>,
    pub filter: Option<FilterInput>,
    #[serde(default)]
    pub skip_pagination: bool,
}

/// The pagination strategy derived from a context.
#[derive(Debug, Clone, PartialEq)]
pub enum Pagination {
    Offset {
        page: u32,
        page_size: u32,
    },
    Cursor {
        after_id: Option<String>,
        before_id: Option<String>,
        page_size: u32,
        direction: Direction,
    },
}

impl Pagination {
    pub fn is_cursor(&self) -> bool {
        matches!(self, Pagination::Cursor { .. })
    }
}

/// The normalized per-request pagination/sort/filter intent. Built fresh
/// per query node, never shared across requests.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub limit: u32,
    pub direction: Direction,
    pub offset_page: Option<u32>,
    /// Decoded primary key of the `after` cursor.
    pub after_id: Option<String>,
    /// Decoded primary key of the `before` cursor.
    pub before_id: Option<String>,
    /// Resolved `(physical field, order)` pairs.
    pub sort: Vec<(String, SortOrder)>,
    pub filter: Option<Filter>,
    pub skip_pagination: bool,
}

impl Context {
    /// The pagination strategy for this context; offset pagination when an
    /// offset page is present, cursor pagination otherwise.
    pub fn pagination(&self) -> Option<Pagination> {
        if self.skip_pagination {
            return None;
        }
        if let Some(page) = self.offset_page {
            return Some(Pagination::Offset {
                page,
                page_size: self.limit,
            });
        }
        Some(Pagination::Cursor {
            after_id: self.after_id.clone(),
            before_id: self.before_id.clone(),
            page_size: self.limit,
            direction: self.direction,
        })
    }

    /// Whether the context carries any condition that must be applied
    /// post-fetch.
    pub fn any_in_memory(&self) -> bool {
        self.filter
            .as_ref()
            .is_some_and(|filter| filter.any_in_memory())
    }
}

/// Build a normalized [`Context`] from raw parameters, resolving sort and
/// filter fields against `schema`.
///
/// Offset and cursor pagination cannot be combined: a request carrying
/// `offset_page` together with `after`/`before` fails with
/// [`Error::MalformedRequest`], as does `first` combined with `last`. The
/// page size is clamped to [`MAX_PAGE_SIZE`] and defaults to it when
/// unspecified.
pub fn build_context(raw: &RawParams, schema: &Schema) -> Result<Context, Error> {
    if raw.offset_page.is_some() && (raw.after.is_some() || raw.before.is_some()) {
        return Err(Error::malformed(
            "offset and cursor pagination cannot be combined",
        ));
    }
    if raw.first.is_some() && raw.last.is_some() {
        return Err(Error::malformed("first and last cannot be combined"));
    }

    let direction = if raw.before.is_some() || raw.last.is_some() {
        Direction::Backward
    } else {
        Direction::Forward
    };

    let requested = match direction {
        Direction::Forward => raw.first,
        Direction::Backward => raw.last,
    };
    let limit = requested.map_or(MAX_PAGE_SIZE, |value| value.min(MAX_PAGE_SIZE));

    let after_id = raw.after.as_deref().map(decode_cursor).transpose()?;
    let before_id = raw.before.as_deref().map(decode_cursor).transpose()?;

    let sort = match &raw.sort {
        Some(param) => resolve_sort(param, schema)?,
        None => Vec::new(),
    };

    let filter = raw
        .filter
        .as_ref()
        .map(|input| build_filter(input, schema))
        .transpose()?;

    Ok(Context {
        limit,
        direction,
        offset_page: raw.offset_page,
        after_id,
        before_id,
        sort,
        filter,
        skip_pagination: raw.skip_pagination,
    })
}

/// Resolve a sort request through the schema's resolver map. A resolver
/// value may name several whitespace-separated physical fields; each one
/// becomes a `(field, order)` pair.
fn resolve_sort(param: &SortParam, schema: &Schema) -> Result<Vec<(String, SortOrder)>, Error> {
    let resolved = schema.resolver_value(&param.field)?;
    Ok(resolved
        .split_whitespace()
        .map(|field| (field.to_string(), param.order))
        .collect())
}

fn build_filter(input: &FilterInput, schema: &Schema) -> Result<Filter, Error> {
    let mut conditions = Vec::new();
    for (field, comparators) in &input.fields {
        conditions.extend(build_conditions(field, comparators, schema)?);
    }

    let mut or_groups = Vec::new();
    for group in &input.or_groups {
        let mut group_conditions = Vec::new();
        for (field, comparators) in group {
            group_conditions.extend(build_conditions(field, comparators, schema)?);
        }
        if !group_conditions.is_empty() {
            or_groups.push(group_conditions);
        }
    }

    Ok(Filter {
        conditions,
        or_groups,
    })
}

/// Build the conditions for a single field, tagging each one in-memory when
/// the schema declares the field as such. The partition is computed here,
/// once, and carried on the context.
fn build_conditions(
    field_name: &str,
    comparators: &BTreeMap<String, Value>,
    schema: &Schema,
) -> Result<Vec<FilterCondition>, Error> {
    let (field, in_memory) = match schema.find_filter_field(field_name) {
        Some(filter_field) => (filter_field.physical_field().to_string(), filter_field.in_memory),
        None => (schema.resolver_value(field_name)?, false),
    };

    comparators
        .iter()
        .map(|(comparator_key, value)| {
            let comparator = Comparator::parse(comparator_key).ok_or_else(|| {
                Error::malformed(format!("unknown comparator `{comparator_key}`"))
            })?;
            Ok(FilterCondition {
                field: field.clone(),
                comparator,
                value: value.clone(),
                in_memory,
            })
        })
        .collect()
}
