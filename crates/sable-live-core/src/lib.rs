//! # Sable Live Core
//!
//! Shared, I/O-free logic for Sable Live: pilot records and snapshots,
//! field-name aliasing, the HTML and JSON results parsers, and the query
//! engine that answers lookups and searches over a snapshot.
//!
//! This crate contains no tokio, networking, or filesystem code. Fetching
//! and caching live in the `sable-live` application crate, which feeds raw
//! documents into [`parse::parse_document`] and hands the resulting
//! [`models::ResultSnapshot`] to [`query::QueryEngine`].

pub mod alias;
pub mod error;
pub mod models;
pub mod parse;
pub mod query;
pub mod text;

pub use error::SourceError;
pub use models::{ContentKind, PilotRecord, ResultSnapshot};
