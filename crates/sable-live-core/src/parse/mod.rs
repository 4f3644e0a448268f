//! Results parsers.
//!
//! Two variants turn a raw document into an ordered list of
//! [`PilotRecord`]s:
//!
//! | Kind | Module | Input |
//! |------|--------|-------|
//! | HTML | [`html`] | results page; the canonical or largest `<table>` is used |
//! | JSON | [`json`] | feed with a column-definition list and positional rows |
//!
//! Both are total: malformed or empty input produces an empty record list.
//! The only failure is a JSON document that does not decode at all, which
//! is reported as [`SourceError::Parse`].

pub mod html;
pub mod json;

use crate::error::SourceError;
use crate::models::{ContentKind, PilotRecord};

/// Records and document-level metadata extracted from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    pub title: Option<String>,
    pub records: Vec<PilotRecord>,
}

/// Parses a document of the given kind.
pub fn parse_document(kind: ContentKind, text: &str) -> Result<ParsedDocument, SourceError> {
    match kind {
        ContentKind::Html => Ok(html::parse_html(text)),
        ContentKind::Json => {
            let value = json::decode(text)?;
            Ok(json::parse_json(&value))
        }
    }
}

/// Placeholder name for a column that has no usable name.
pub(crate) fn placeholder_name(idx: usize) -> String {
    format!("col{}", idx)
}

/// Adds `value` under the first of `preferred`, `fallback` (if any) or the
/// index placeholder that the record does not use yet.
pub(crate) fn push_named(
    record: &mut PilotRecord,
    preferred: Option<&str>,
    fallback: Option<&str>,
    idx: usize,
    value: String,
) {
    let candidates = preferred
        .into_iter()
        .chain(fallback)
        .filter(|name| !name.is_empty());
    for name in candidates {
        if !record.contains(name) {
            record.push_field(name, value);
            return;
        }
    }
    let placeholder = placeholder_name(idx);
    if !record.contains(&placeholder) {
        record.push_field(placeholder, value);
    } else {
        record.push_extra(value);
    }
}
