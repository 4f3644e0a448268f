//! Query engine over a results snapshot.
//!
//! The engine never fetches; callers obtain a [`ResultSnapshot`] from the
//! cache and query it here. Absence is never an error: a lookup with no
//! match returns `None` and a search with no match returns an empty list.
//!
//! # Search ordering
//!
//! 1. Records whose resolved bib number equals the query come first.
//! 2. Then by the projected position, compared as a string.
//! 3. Ties keep snapshot order (stable sort).

use serde::Serialize;
use std::collections::HashSet;

use crate::alias::{LogicalField, ResolvedFields};
use crate::models::{PilotRecord, ResultSnapshot};
use crate::text::normalize_ws;

/// Maximum number of rows returned by [`QueryEngine::search_text`].
pub const FREE_TEXT_LIMIT: usize = 20;

/// A search hit projected onto the logical fields.
///
/// Fields with no resolvable alias in the record are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub position: String,
    pub number: String,
    pub name: String,
    pub time: String,
    pub gap: String,
    /// The full source record.
    pub record: PilotRecord,
}

impl ResultRow {
    fn project(record: &PilotRecord) -> Self {
        let f = ResolvedFields::of(record);
        let own = |v: Option<&str>| v.unwrap_or_default().to_string();
        Self {
            position: own(f.position),
            number: own(f.number),
            name: own(f.name),
            time: own(f.time),
            gap: own(f.gap),
            record: record.clone(),
        }
    }
}

/// Read-only queries against one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'a> {
    snapshot: &'a ResultSnapshot,
}

impl<'a> QueryEngine<'a> {
    pub fn new(snapshot: &'a ResultSnapshot) -> Self {
        Self { snapshot }
    }

    /// Every record, in snapshot order.
    pub fn all(&self) -> &'a [PilotRecord] {
        &self.snapshot.records
    }

    /// First record whose bib number equals `id`.
    pub fn by_identifier(&self, id: &str) -> Option<&'a PilotRecord> {
        self.snapshot
            .records
            .iter()
            .find(|record| LogicalField::Number.resolve(record) == Some(id))
    }

    /// Case-insensitive substring search over every field of every record.
    ///
    /// An empty (or whitespace-only) query matches nothing.
    pub fn search(&self, query: &str) -> Vec<ResultRow> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();

        let mut rows: Vec<ResultRow> = self
            .snapshot
            .records
            .iter()
            .filter(|record| haystack(record).contains(&needle))
            .map(ResultRow::project)
            .collect();

        let bucket = |row: &ResultRow| u8::from(row.number != query);
        rows.sort_by(|a, b| {
            bucket(a)
                .cmp(&bucket(b))
                .then_with(|| a.position.cmp(&b.position))
        });
        rows
    }

    /// Free-text row search: each matching record as one line of text.
    ///
    /// Identical lines are collapsed (first occurrence kept) and the result
    /// is capped at [`FREE_TEXT_LIMIT`] entries.
    pub fn search_text(&self, query: &str) -> Vec<String> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();

        let mut seen = HashSet::new();
        self.snapshot
            .records
            .iter()
            .map(row_text)
            .filter(|text| text.to_lowercase().contains(&needle))
            .filter(|text| seen.insert(text.clone()))
            .take(FREE_TEXT_LIMIT)
            .collect()
    }
}

fn haystack(record: &PilotRecord) -> String {
    record.values().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn row_text(record: &PilotRecord) -> String {
    normalize_ws(&record.values().collect::<Vec<_>>().join(" "))
}
