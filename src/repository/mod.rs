//! The storage collaborator contract and its data-plane types.
//!
//! The engine never talks to a store directly; each resource carries an
//! implementation of [`Repository`] and the engine only ever calls its
//! abstract `read` operation. Entities are opaque [`serde_json::Value`]
//! objects: the engine reads nothing from them beyond the accessors the
//! declared schema names, via [`Repository::serialize`].

pub mod memory;

use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::RepositoryError;
use crate::pagination::{PageInfo, key_string};

pub use memory::MemoryRepository;

/// A verb-specific read payload: filter/lookup fields keyed by name.
pub type Dto = Map<String, Value>;

/// A serialized entity projection.
pub type Projection = Map<String, Value>;

/// Contract a storage layer satisfies for one resource.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Execute a read described by `dto`, optionally shaped by a normalized
    /// pagination/sort/filter `context`.
    ///
    /// Implementations must return entities in a stable, deterministic
    /// order for identical inputs; batching relies on it.
    async fn read(
        &self,
        dto: &Dto,
        context: Option<&Context>,
    ) -> Result<ReadResult, RepositoryError>;

    /// Project an opaque entity into the declared schema's fields.
    fn serialize(&self, entity: &Value) -> Projection;
}

/// The repository's response: an ordered batch of entities plus page
/// metadata.
#[derive(Debug, Clone, Default)]
pub struct ReadResult {
    pub entities: Vec<Value>,
    pub page_info: PageInfo,
}

impl ReadResult {
    pub fn new(entities: Vec<Value>) -> Self {
        Self {
            entities,
            page_info: PageInfo::default(),
        }
    }

    pub fn with_page_info(mut self, page_info: PageInfo) -> Self {
        self.page_info = page_info;
        self
    }
}

/// A batching key extracted from a parent row.
///
/// Wraps the raw JSON value (a scalar, or an array for composite
/// has-many-through keys) and hashes/compares by canonical string so that
/// numeric and string keys batch and index uniformly.
#[derive(Debug, Clone)]
pub struct Key(Value);

impl Key {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Canonical string form used for hashing, deduplication and row
    /// indexing.
    pub fn canonical(&self) -> String {
        key_string(&self.0)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// The scalar values this key carries: one for scalar keys, each
    /// element for composite (array) keys. Nulls are dropped.
    pub fn scalars(&self) -> Vec<&Value> {
        match &self.0 {
            Value::Array(items) => items.iter().filter(|item| !item.is_null()).collect(),
            Value::Null => Vec::new(),
            other => vec![other],
        }
    }

    /// Whether this (possibly composite) key contains `value`.
    pub fn contains(&self, value: &Value) -> bool {
        let needle = key_string(value);
        self.scalars()
            .iter()
            .any(|scalar| key_string(scalar) == needle)
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::new(Value::from(value))
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::new(Value::from(value))
    }
}

/// The reshaped value produced for one parent key.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    /// Single-cardinality result; `None` when no row matched the key.
    One(Option<Projection>),
    /// Many-cardinality result; empty when no rows matched.
    Many(Vec<Projection>),
}

impl Loaded {
    pub fn is_empty(&self) -> bool {
        match self {
            Loaded::One(row) => row.is_none(),
            Loaded::Many(rows) => rows.is_empty(),
        }
    }
}
