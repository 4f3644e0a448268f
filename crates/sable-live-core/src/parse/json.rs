//! JSON results-feed parsing.
//!
//! Feeds describe their columns once and send rows as positional value
//! lists:
//!
//! ```json
//! {
//!   "Titre": "Enduro des Sables",
//!   "Colonnes": [{"Nom": "Clt"}, {"Nom": "Numero"}, {"Libelle": "Pilote"}],
//!   "Donnees": [["1", "12", "Dupont"], ["2", "7", "Martin"]]
//! }
//! ```
//!
//! Column names come from the declared name, else the fallback label, else
//! a `col{index}` placeholder. Rows that are not lists are skipped. A bare
//! top-level array is read as rows without column definitions.

use serde_json::{Map, Value};

use crate::error::SourceError;
use crate::models::PilotRecord;
use crate::parse::{placeholder_name, push_named, ParsedDocument};

const COLUMN_KEYS: &[&str] = &["Colonnes", "columns", "cols"];
const ROW_KEYS: &[&str] = &["Donnees", "Lignes", "rows", "data"];
const NAME_KEYS: &[&str] = &["Nom", "name"];
const LABEL_KEYS: &[&str] = &["Libelle", "label", "Titre", "title"];
const TITLE_KEYS: &[&str] = &["Titre", "title"];

/// Decodes feed text, tolerating a leading UTF-8 byte-order mark.
pub fn decode(text: &str) -> Result<Value, SourceError> {
    serde_json::from_str(strip_bom(text))
        .map_err(|e| SourceError::parse(format!("invalid JSON document: {}", e)))
}

pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Builds one record per row-list in a decoded feed. Never fails.
pub fn parse_json(doc: &Value) -> ParsedDocument {
    match doc {
        Value::Array(rows) => ParsedDocument {
            title: None,
            records: build_records(None, rows),
        },
        Value::Object(obj) => {
            let table = locate_table(obj);
            let title = table
                .and_then(|t| first_string(t, TITLE_KEYS))
                .or_else(|| first_string(obj, TITLE_KEYS))
                .map(str::to_string);
            let records = table
                .and_then(|t| first_key(t, ROW_KEYS))
                .and_then(Value::as_array)
                .map(|rows| {
                    let columns = table
                        .and_then(|t| first_key(t, COLUMN_KEYS))
                        .and_then(Value::as_array);
                    build_records(columns, rows)
                })
                .unwrap_or_default();
            ParsedDocument { title, records }
        }
        _ => ParsedDocument::default(),
    }
}

/// The object holding the rows: the document itself, or one of its direct
/// object members.
fn locate_table(obj: &Map<String, Value>) -> Option<&Map<String, Value>> {
    if first_key(obj, ROW_KEYS).is_some() {
        return Some(obj);
    }
    obj.values()
        .filter_map(Value::as_object)
        .find(|inner| first_key(inner, ROW_KEYS).is_some())
}

fn build_records(columns: Option<&Vec<Value>>, rows: &[Value]) -> Vec<PilotRecord> {
    let names: Option<Vec<String>> = columns.map(|cols| {
        cols.iter()
            .enumerate()
            .map(|(idx, col)| column_name(col, idx))
            .collect()
    });

    rows.iter()
        .filter_map(Value::as_array)
        .map(|values| {
            let mut record = PilotRecord::new();
            match &names {
                Some(names) => {
                    for (idx, (name, value)) in names.iter().zip(values).enumerate() {
                        push_named(&mut record, Some(name.as_str()), None, idx, stringify(value));
                    }
                }
                None => {
                    for (idx, value) in values.iter().enumerate() {
                        push_named(&mut record, None, None, idx, stringify(value));
                    }
                }
            }
            record
        })
        .collect()
}

fn column_name(col: &Value, idx: usize) -> String {
    match col {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Object(obj) => first_string(obj, NAME_KEYS)
            .or_else(|| first_string(obj, LABEL_KEYS))
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_name(idx)),
        _ => placeholder_name(idx),
    }
}

fn first_key<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn first_string<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
