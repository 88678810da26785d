//! Cursor-based pagination types.
//!
//! Implements the Relay connection shape used for consistent pagination
//! across list reads, plus the opaque cursor scheme: a cursor is the base64
//! encoding of a row's primary key behind a fixed prefix. Decoding a
//! malformed cursor fails with [`Error::InvalidCursor`] rather than
//! silently truncating.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Information about pagination in a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// When paginating forwards, are there more items?
    pub has_next_page: bool,
    /// When paginating backwards, are there more items?
    pub has_previous_page: bool,
    /// Cursor of the first item in this page.
    pub start_cursor: Option<String>,
    /// Cursor of the last item in this page.
    pub end_cursor: Option<String>,
    /// Total count of items, when the store can provide it.
    pub total_count: Option<i64>,
}

/// An edge in a connection, containing a node and its cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge<T> {
    pub node: T,
    pub cursor: String,
}

/// A paginated connection result.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    /// An empty connection with truthful metadata.
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo {
                total_count: Some(0),
                ..PageInfo::default()
            },
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|edge| &edge.node)
    }
}

impl Connection<Map<String, Value>> {
    /// Build a connection from serialized rows, deriving each edge's cursor
    /// from the row's primary key and carrying the store's page metadata
    /// through.
    pub fn from_rows(
        rows: Vec<Map<String, Value>>,
        mut page_info: PageInfo,
        primary_key: &str,
    ) -> Self {
        let edges: Vec<Edge<Map<String, Value>>> = rows
            .into_iter()
            .map(|node| {
                let cursor = encode_cursor(&key_string(
                    node.get(primary_key).unwrap_or(&Value::Null),
                ));
                Edge { node, cursor }
            })
            .collect();

        if page_info.start_cursor.is_none() {
            page_info.start_cursor = edges.first().map(|edge| edge.cursor.clone());
        }
        if page_info.end_cursor.is_none() {
            page_info.end_cursor = edges.last().map(|edge| edge.cursor.clone());
        }

        Self { edges, page_info }
    }
}

/// Canonical string form of a JSON scalar, used for cursor material and for
/// indexing rows by join-key value.
pub(crate) fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Encode a row's primary key as an opaque cursor string.
pub fn encode_cursor(primary_key: &str) -> String {
    BASE64.encode(format!("cursor:{primary_key}"))
}

/// Decode an opaque cursor back to the primary key it references.
pub fn decode_cursor(cursor: &str) -> Result<String, Error> {
    let decoded = BASE64
        .decode(cursor)
        .map_err(|_| Error::InvalidCursor("invalid cursor format".to_string()))?;

    let s = String::from_utf8(decoded)
        .map_err(|_| Error::InvalidCursor("invalid cursor encoding".to_string()))?;

    s.strip_prefix("cursor:")
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidCursor("invalid cursor prefix".to_string()))
}
