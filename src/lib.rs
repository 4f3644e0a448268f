//! # sable-live
//!
//! Live results companion for sand-racing events.
//!
//! The results page of an event (HTML table or JSON feed) is fetched on
//! demand, parsed into pilot records, cached for a short time, and served
//! through a small JSON API and the `sable` CLI. Visitors can also leave
//! votes and comments, stored as flat files.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ SourceFetcher│──▶│ ResultParser │──▶│ ResultCache  │
//! │ file / HTTP  │   │ HTML / JSON  │   │ TTL + floor  │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │
//!                         ┌────────────────────┤
//!                         ▼                    ▼
//!                    ┌──────────┐        ┌──────────┐
//!                    │   CLI    │        │   HTTP   │
//!                    │ (sable)  │        │  (axum)  │
//!                    └──────────┘        └──────────┘
//! ```
//!
//! Parsing, field aliasing and queries live in the I/O-free
//! [`sable_live_core`] crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and env overrides |
//! | [`source`] | Local file and HTTP acquisition |
//! | [`cache`] | Snapshot cache with single-flight refresh |
//! | [`feedback`] | Votes, comments, visit counter, webhook |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI command implementations |
//! | [`logging`] | Tracing subscriber setup |

pub mod cache;
pub mod commands;
pub mod config;
pub mod feedback;
pub mod logging;
pub mod server;
pub mod source;

pub use sable_live_core as core;
