//! In-memory context application.
//!
//! Post-processes an already-fetched, already-serialized page to apply the
//! filter conditions the store could not evaluate, then recomputes the page
//! metadata so it stays truthful: the store's `PageInfo` reflects the
//! unfiltered result and would otherwise be inconsistent with what the
//! client actually receives. Applying the same context twice yields the
//! same output.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::context::{Comparator, Context, Filter, FilterCondition};
use crate::pagination::{PageInfo, encode_cursor, key_string};
use crate::repository::Projection;

/// An already-fetched, already-serialized page of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub rows: Vec<Projection>,
    pub page_info: PageInfo,
    /// Field holding each row's primary key, used to rebuild boundary
    /// cursors after filtering.
    pub primary_key: String,
}

impl Page {
    pub fn new(rows: Vec<Projection>, page_info: PageInfo) -> Self {
        Self {
            rows,
            page_info,
            primary_key: "id".to_string(),
        }
    }

    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }
}

/// Apply the context's in-memory conditions to a page.
///
/// A no-op unless the context carries at least one in-memory condition.
/// Rows must satisfy every in-memory condition (logical AND); an `or` group
/// passes when any member matches and is AND'ed with the rest. After
/// filtering, `total_count` is recomputed from the surviving rows,
/// `has_next_page`/`has_previous_page` survive only when the boundary row
/// that justified them survived, and the boundary cursors are re-encoded
/// from the surviving rows' primary keys.
pub fn apply(page: Page, context: &Context) -> Page {
    let Some(filter) = context.filter.as_ref() else {
        return page;
    };
    if !filter.any_in_memory() {
        return page;
    }

    let first_survives = page
        .rows
        .first()
        .is_some_and(|row| matches_in_memory(row, filter));
    let last_survives = page
        .rows
        .last()
        .is_some_and(|row| matches_in_memory(row, filter));

    let rows: Vec<Projection> = page
        .rows
        .into_iter()
        .filter(|row| matches_in_memory(row, filter))
        .collect();

    tracing::debug!(
        surviving = rows.len(),
        "applied in-memory filter conditions"
    );

    let cursor_for = |row: &Projection| {
        encode_cursor(&key_string(
            row.get(&page.primary_key).unwrap_or(&Value::Null),
        ))
    };

    let page_info = PageInfo {
        has_next_page: page.page_info.has_next_page && last_survives,
        has_previous_page: page.page_info.has_previous_page && first_survives,
        start_cursor: rows.first().map(cursor_for),
        end_cursor: rows.last().map(cursor_for),
        total_count: Some(rows.len() as i64),
    };

    Page {
        rows,
        page_info,
        primary_key: page.primary_key,
    }
}

/// Whether a row satisfies every in-memory condition of `filter`.
fn matches_in_memory(row: &Projection, filter: &Filter) -> bool {
    let ands = filter
        .in_memory_conditions()
        .all(|condition| matches_condition(row, condition));

    let ors = filter.or_groups.iter().all(|group| {
        let in_memory: Vec<&FilterCondition> = group
            .iter()
            .filter(|condition| condition.in_memory)
            .collect();
        in_memory.is_empty()
            || in_memory
                .iter()
                .any(|condition| matches_condition(row, condition))
    });

    ands && ors
}

/// Evaluate one condition against a serialized row.
pub(crate) fn matches_condition(row: &Projection, condition: &FilterCondition) -> bool {
    let actual = row.get(&condition.field).unwrap_or(&Value::Null);
    let expected = &condition.value;

    match condition.comparator {
        Comparator::Eq => values_equal(actual, expected),
        Comparator::NotEq => !values_equal(actual, expected),
        Comparator::Gt => compare(actual, expected) == Some(Ordering::Greater),
        Comparator::Lt => compare(actual, expected) == Some(Ordering::Less),
        Comparator::Gteq => {
            matches!(compare(actual, expected), Some(Ordering::Greater | Ordering::Equal))
        }
        Comparator::Lteq => {
            matches!(compare(actual, expected), Some(Ordering::Less | Ordering::Equal))
        }
        Comparator::Contains => {
            string_pair(actual, expected).is_some_and(|(a, b)| a.contains(&b))
        }
        Comparator::StartsWith => {
            string_pair(actual, expected).is_some_and(|(a, b)| a.starts_with(&b))
        }
        Comparator::EndsWith => {
            string_pair(actual, expected).is_some_and(|(a, b)| a.ends_with(&b))
        }
        Comparator::In => expected
            .as_array()
            .is_some_and(|candidates| candidates.iter().any(|value| values_equal(actual, value))),
        Comparator::Between => expected.as_array().is_some_and(|bounds| {
            let (Some(low), Some(high)) = (bounds.first(), bounds.get(1)) else {
                return false;
            };
            matches!(compare(actual, low), Some(Ordering::Greater | Ordering::Equal))
                && matches!(compare(actual, high), Some(Ordering::Less | Ordering::Equal))
        }),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) {
        return a == b;
    }
    a == b
}

/// Lowercased string pair for the substring comparators.
fn string_pair(a: &Value, b: &Value) -> Option<(String, String)> {
    Some((a.as_str()?.to_lowercase(), b.as_str()?.to_lowercase()))
}

/// Ordering between two JSON values: numeric when both sides are numbers,
/// temporal when both parse as ISO-8601 dates or date-times, lexicographic
/// otherwise.
pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) {
        return a.partial_cmp(&b);
    }

    let (a, b) = (a.as_str()?, b.as_str()?);
    if let (Some(a), Some(b)) = (parse_instant(a), parse_instant(b)) {
        return Some(a.cmp(&b));
    }
    Some(a.cmp(b))
}

/// Parse an ISO-8601 date or date-time into a comparable timestamp.
fn parse_instant(input: &str) -> Option<NaiveDateTime> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(input) {
        return Some(datetime.naive_utc());
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
