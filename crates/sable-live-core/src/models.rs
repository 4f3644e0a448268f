//! Core data models: pilot records and result snapshots.
//!
//! A [`PilotRecord`] is one row of an upstream results table. A
//! [`ResultSnapshot`] is a whole table from one fetch cycle; it is built
//! once by the parser and then shared read-only (behind an `Arc` in the
//! cache) until the next successful fetch replaces it.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// One row of the results table.
///
/// Field names come from the source (header cells, JSON column names, or
/// positional defaults) and vary between sources, so there is no fixed
/// schema. Field order follows the source columns. Cells beyond the named
/// columns of an HTML row are kept in an overflow list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PilotRecord {
    fields: Vec<(String, String)>,
    extra: Vec<String>,
}

impl PilotRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from `(name, value)` pairs. Later duplicates of a
    /// name are dropped.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = Self::new();
        for (k, v) in pairs {
            record.push_field(k, v);
        }
        record
    }

    /// Appends a field. Returns `false` (and stores nothing) if a field with
    /// the exact same name already exists.
    pub fn push_field(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.fields.push((name, value.into()));
        true
    }

    pub fn push_extra(&mut self, value: impl Into<String>) {
        self.extra.push(value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == name)
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn extra(&self) -> &[String] {
        &self.extra
    }

    /// All values in column order, named fields first, then overflow cells.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(|(_, v)| v.as_str())
            .chain(self.extra.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.extra.is_empty()
    }
}

impl Serialize for PilotRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let has_extra = !self.extra.is_empty() && !self.contains("extra");
        let len = self.fields.len() + usize::from(has_extra);
        let mut map = serializer.serialize_map(Some(len))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        if has_extra {
            map.serialize_entry("extra", &self.extra)?;
        }
        map.end()
    }
}

/// Shape of a fetched results document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Html,
    Json,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Html => f.write_str("html"),
            ContentKind::Json => f.write_str("json"),
        }
    }
}

/// Raw text returned by a fetch, before parsing.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub text: String,
    pub kind: ContentKind,
    /// Upstream HTTP status (synthesized as 200 for local files).
    pub status: u16,
}

/// One fully parsed results table as of one fetch cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ResultSnapshot {
    pub records: Vec<PilotRecord>,
    /// When the document was fetched. `None` for the empty placeholder.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Upstream status of the fetch that produced this snapshot.
    pub status: u16,
    /// Source the snapshot was fetched from (path or URL).
    pub source: String,
    /// Document title, when the source carries one.
    pub title: Option<String>,
    pub kind: Option<ContentKind>,
}

impl ResultSnapshot {
    /// Placeholder handed out before any fetch has succeeded.
    pub fn empty(source: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            fetched_at: None,
            status: 0,
            source: source.into(),
            title: None,
            kind: None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_field_rejects_duplicate_name() {
        let mut record = PilotRecord::new();
        assert!(record.push_field("Nom", "Dupont"));
        assert!(!record.push_field("Nom", "Martin"));
        assert_eq!(record.get("Nom"), Some("Dupont"));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_values_include_overflow_cells() {
        let mut record = PilotRecord::from_pairs([("position", "1"), ("number", "12")]);
        record.push_extra("Quad");
        let values: Vec<&str> = record.values().collect();
        assert_eq!(values, vec!["1", "12", "Quad"]);
    }

    #[test]
    fn test_serialize_preserves_field_order() {
        let mut record = PilotRecord::from_pairs([("Numero", "12"), ("Nom", "Dupont")]);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"Numero":"12","Nom":"Dupont"}"#);

        record.push_extra("+2 tours");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"Numero":"12","Nom":"Dupont","extra":["+2 tours"]}"#);
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = ResultSnapshot::empty("results.html");
        assert!(snap.is_empty());
        assert_eq!(snap.status, 0);
        assert!(snap.fetched_at.is_none());
        assert_eq!(snap.source, "results.html");
    }
}
