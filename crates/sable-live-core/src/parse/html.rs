//! HTML results-table extraction.
//!
//! Live timing pages are generated by a handful of different tools and are
//! rarely well-formed, so this is a forgiving tag scanner rather than a DOM
//! builder. Rows run from one `<tr` to the next and cells from one
//! `<td`/`<th` to the next, which tolerates omitted closing tags.
//!
//! # Table selection
//!
//! 1. If an element carries the class `result-table`, only its content is
//!    considered.
//! 2. Among all `<table>` elements in that region, the one with the most
//!    `<tr>` rows wins (first one on ties).
//! 3. With no table at all, the region's own rows are used.
//!
//! The first row is always treated as the header and skipped. When it is
//! made of `<th>` cells, their texts name the columns; otherwise columns are
//! named by position (`position`, `number`, `name`, `time`, `gap`) and any
//! further cells go to the record's overflow list.

use crate::alias::LogicalField;
use crate::models::PilotRecord;
use crate::parse::{push_named, ParsedDocument};
use crate::text::{decode_entities, normalize_ws};

/// Class marking the canonical results container.
pub const RESULTS_CONTAINER_CLASS: &str = "result-table";

/// Parses a results page. Never fails; unusable input yields no records.
pub fn parse_html(doc: &str) -> ParsedDocument {
    let cleaned = strip_ignored(doc);
    // ASCII-only lowercasing keeps byte offsets identical between the two.
    let lc = cleaned.to_ascii_lowercase();

    let title = extract_title(&cleaned, &lc);
    let (start, end) = results_container(&lc).unwrap_or((0, lc.len()));
    let rows = select_rows(&cleaned[start..end], &lc[start..end]);

    ParsedDocument {
        title,
        records: rows_to_records(rows),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cell {
    text: String,
    header: bool,
}

type Row = Vec<Cell>;

#[derive(Debug, Clone, Copy)]
struct Span {
    content_start: usize,
    content_end: usize,
}

fn rows_to_records(rows: Vec<Row>) -> Vec<PilotRecord> {
    let mut rows = rows.into_iter();
    let header = match rows.next() {
        Some(h) => h,
        None => return Vec::new(),
    };

    let names: Vec<Option<String>> = if !header.is_empty() && header.iter().all(|c| c.header) {
        header
            .into_iter()
            .map(|c| Some(c.text).filter(|t| !t.is_empty()))
            .collect()
    } else {
        Vec::new()
    };

    rows.filter(|row| !row.is_empty())
        .map(|row| row_to_record(row, &names))
        .collect()
}

fn row_to_record(row: Row, names: &[Option<String>]) -> PilotRecord {
    let mut record = PilotRecord::new();
    for (idx, cell) in row.into_iter().enumerate() {
        let header = names.get(idx).and_then(|n| n.as_deref());
        let positional = LogicalField::at_index(idx).map(LogicalField::positional_name);
        if header.is_none() && positional.is_none() {
            record.push_extra(cell.text);
            continue;
        }
        push_named(&mut record, header, positional, idx, cell.text);
    }
    record
}

/// Content span of the first element flagged as the results container.
fn results_container(lc: &str) -> Option<(usize, usize)> {
    for tag in ["div", "table", "section"] {
        let open = format!("<{}", tag);
        let mut pos = 0;
        while let Some(start) = find_tag(lc, &open, pos) {
            let open_end = tag_end(lc, start);
            if has_class(&lc[start..open_end], RESULTS_CONTAINER_CLASS) {
                let span = element_span(lc, tag, start);
                return Some((span.content_start, span.content_end));
            }
            pos = open_end;
        }
    }
    None
}

fn select_rows(html: &str, lc: &str) -> Vec<Row> {
    let mut best: Option<(Span, usize)> = None;
    let mut pos = 0;
    while let Some(start) = find_tag(lc, "<table", pos) {
        let span = element_span(lc, "table", start);
        let rows = tag_positions(&lc[..span.content_end], "<tr", span.content_start).len();
        if best.map_or(true, |(_, n)| rows > n) {
            best = Some((span, rows));
        }
        // Continue right after the opener so nested tables are candidates too.
        pos = tag_end(lc, start);
    }

    match best {
        Some((span, _)) => extract_rows(
            &html[span.content_start..span.content_end],
            &lc[span.content_start..span.content_end],
        ),
        None => extract_rows(html, lc),
    }
}

fn extract_rows(html: &str, lc: &str) -> Vec<Row> {
    let starts = tag_positions(lc, "<tr", 0);
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(lc.len());
            let content_start = tag_end(lc, start).min(end);
            extract_cells(&html[content_start..end], &lc[content_start..end])
        })
        .collect()
}

fn extract_cells(html: &str, lc: &str) -> Row {
    let mut starts = tag_positions(lc, "<td", 0);
    starts.extend(tag_positions(lc, "<th", 0));
    starts.sort_unstable();

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(lc.len());
            let content_start = tag_end(lc, start).min(end);
            Cell {
                text: clean_text(&html[content_start..end]),
                header: lc[start..].starts_with("<th"),
            }
        })
        .collect()
}

fn extract_title(html: &str, lc: &str) -> Option<String> {
    let start = find_tag(lc, "<title", 0)?;
    let content_start = tag_end(lc, start);
    let end = find_tag(lc, "</title", content_start)?;
    let title = clean_text(&html[content_start..end]);
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Tag-stripped, entity-decoded, whitespace-collapsed text of a fragment.
///
/// Tags become word separators, so `Jean<br>Dupont` reads `Jean Dupont`.
fn clean_text(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    let mut chars = fragment.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '<' if !in_tag && chars.peek().is_some_and(|&c| opens_tag(c)) => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    normalize_ws(&decode_entities(&out))
}

/// A `<` starts markup only before a tag name, a closing slash or `!`.
fn opens_tag(next: char) -> bool {
    next.is_ascii_alphabetic() || next == '/' || next == '!'
}

/// Drops comments, `<script>` and `<style>` blocks.
fn strip_ignored(doc: &str) -> String {
    let lc = doc.to_ascii_lowercase();
    let mut out = String::with_capacity(doc.len());
    let mut pos = 0;

    loop {
        let comment = lc[pos..].find("<!--").map(|i| (pos + i, "-->"));
        let script = find_tag(&lc, "<script", pos).map(|i| (i, "</script"));
        let style = find_tag(&lc, "<style", pos).map(|i| (i, "</style"));

        let next = [comment, script, style]
            .into_iter()
            .flatten()
            .min_by_key(|(start, _)| *start);

        let (start, close) = match next {
            Some(n) => n,
            None => break,
        };

        out.push_str(&doc[pos..start]);
        out.push(' ');
        pos = if close == "-->" {
            lc[start + 4..]
                .find(close)
                .map(|i| start + 4 + i + close.len())
                .unwrap_or(lc.len())
        } else {
            find_tag(&lc, close, start + 1)
                .map(|i| tag_end(&lc, i))
                .unwrap_or(lc.len())
        };
    }

    out.push_str(&doc[pos..]);
    out
}

/// Finds `pat` (e.g. `<tr` or `</table`) at or after `from`, requiring a tag
/// name boundary so `<tr` does not match `<track`.
fn find_tag(lc: &str, pat: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(rel) = lc.get(pos..)?.find(pat) {
        let start = pos + rel;
        let after = start + pat.len();
        match lc.as_bytes().get(after) {
            None => return None,
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => return Some(start),
            _ => pos = after,
        }
    }
    None
}

fn tag_positions(lc: &str, pat: &str, from: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut pos = from;
    while let Some(start) = find_tag(lc, pat, pos) {
        out.push(start);
        pos = start + pat.len();
    }
    out
}

/// Byte offset just past the `>` closing the tag that starts at `start`.
fn tag_end(lc: &str, start: usize) -> usize {
    lc[start..]
        .find('>')
        .map(|i| start + i + 1)
        .unwrap_or(lc.len())
}

/// Content span of the element opened at `start`, honouring nesting of the
/// same tag. An unterminated element runs to the end of the input.
fn element_span(lc: &str, name: &str, start: usize) -> Span {
    let open = format!("<{}", name);
    let close = format!("</{}", name);
    let content_start = tag_end(lc, start);
    let mut depth = 1usize;
    let mut pos = content_start;

    loop {
        let next_close = match find_tag(lc, &close, pos) {
            Some(c) => c,
            None => {
                return Span {
                    content_start,
                    content_end: lc.len(),
                }
            }
        };
        match find_tag(lc, &open, pos) {
            Some(o) if o < next_close => {
                depth += 1;
                pos = tag_end(lc, o);
            }
            _ => {
                depth -= 1;
                if depth == 0 {
                    return Span {
                        content_start,
                        content_end: next_close,
                    };
                }
                pos = tag_end(lc, next_close);
            }
        }
    }
}

fn has_class(opener: &str, class: &str) -> bool {
    attr_value(opener, "class")
        .map(|v| v.split_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

fn attr_value<'a>(opener: &'a str, attr: &str) -> Option<&'a str> {
    let bytes = opener.as_bytes();
    let mut pos = 0;
    while let Some(rel) = opener[pos..].find(attr) {
        let start = pos + rel;
        pos = start + attr.len();
        let preceded = start > 0 && bytes[start - 1].is_ascii_whitespace();
        if !preceded {
            continue;
        }
        let rest = opener[pos..].trim_start();
        let rest = match rest.strip_prefix('=') {
            Some(r) => r.trim_start(),
            None => continue,
        };
        return Some(match rest.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let inner = &rest[1..];
                &inner[..inner.find(q).unwrap_or(inner.len())]
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                &rest[..end]
            }
        });
    }
    None
}
