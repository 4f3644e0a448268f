//! Results source acquisition.
//!
//! A configured source string is parsed once into a [`SourceSpec`]:
//!
//! | Variant | Example | Read with |
//! |------|---------|-----------|
//! | [`SourceSpec::Remote`] | `https://www.courses-sur-sable.fr/live/` | `reqwest` GET |
//! | [`SourceSpec::FileUri`] | `file:///srv/live/test_live.html` | `tokio::fs` |
//! | [`SourceSpec::LocalPath`] | `./test_live.html` | `tokio::fs` |
//!
//! Local reads synthesize status 200. Remote reads send a descriptive
//! `User-Agent` and cache-busting headers, and fail on non-2xx responses.
//! Every failure is a [`SourceError::Fetch`] carrying the upstream status,
//! or `0` when no response was received.
//!
//! The [`Fetch`] trait is the seam the result cache depends on, so tests
//! can substitute an in-memory source.

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use std::fmt;
use std::path::{Path, PathBuf};

use sable_live_core::models::RawDocument;
use sable_live_core::parse::json::strip_bom;
use sable_live_core::{ContentKind, SourceError};

use crate::config::SourceConfig;

/// Something that can produce a raw results document.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Human-readable source identifier (path or URL).
    fn source(&self) -> &str;

    /// Retrieves the document. Must not touch shared state.
    async fn fetch(&self) -> Result<RawDocument, SourceError>;
}

/// Where the results live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    LocalPath(PathBuf),
    FileUri(PathBuf),
    Remote(String),
}

impl SourceSpec {
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if let Some(path) = spec.strip_prefix("file://") {
            return SourceSpec::FileUri(PathBuf::from(path));
        }
        let lower = spec.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return SourceSpec::Remote(spec.to_string());
        }
        SourceSpec::LocalPath(PathBuf::from(spec))
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::LocalPath(path) => write!(f, "{}", path.display()),
            SourceSpec::FileUri(path) => write!(f, "file://{}", path.display()),
            SourceSpec::Remote(url) => f.write_str(url),
        }
    }
}

/// The production [`Fetch`] implementation.
pub struct SourceFetcher {
    spec: SourceSpec,
    label: String,
    forced_kind: Option<ContentKind>,
    client: reqwest::Client,
}

impl SourceFetcher {
    pub fn new(config: &SourceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()?;
        let spec = SourceSpec::parse(&config.url);
        Ok(Self {
            label: spec.to_string(),
            spec,
            forced_kind: config.forced_kind(),
            client,
        })
    }

    async fn read_file(&self, path: &Path) -> Result<RawDocument, SourceError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SourceError::fetch(0, format!("cannot read {}: {}", path.display(), e)))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let location = path.to_string_lossy();
        self.document(text, None, &location, 200)
    }

    async fn get_remote(&self, url: &str) -> Result<RawDocument, SourceError> {
        let resp = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| SourceError::fetch(0, describe_request_error(&e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::fetch(
                status.as_u16(),
                format!("upstream returned {}", status),
            ));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Decoded with the charset declared in Content-Type, UTF-8 otherwise.
        let text = resp.text().await.map_err(|e| {
            let code = if e.is_timeout() { 0 } else { status.as_u16() };
            SourceError::fetch(code, describe_request_error(&e))
        })?;
        let text = if text.starts_with('\u{feff}') {
            strip_bom(&text).to_string()
        } else {
            text
        };

        self.document(text, content_type.as_deref(), url, status.as_u16())
    }

    fn document(
        &self,
        text: String,
        content_type: Option<&str>,
        location: &str,
        status: u16,
    ) -> Result<RawDocument, SourceError> {
        if text.trim().is_empty() {
            return Err(SourceError::fetch(status, "empty document"));
        }
        let kind = self
            .forced_kind
            .unwrap_or_else(|| detect_kind(content_type, location, &text));
        Ok(RawDocument { text, kind, status })
    }
}

#[async_trait]
impl Fetch for SourceFetcher {
    fn source(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<RawDocument, SourceError> {
        match &self.spec {
            SourceSpec::LocalPath(path) | SourceSpec::FileUri(path) => self.read_file(path).await,
            SourceSpec::Remote(url) => self.get_remote(url).await,
        }
    }
}

/// Picks JSON for a JSON content type, a `.json` location, or a body that
/// opens like a JSON document; HTML otherwise.
pub fn detect_kind(content_type: Option<&str>, location: &str, text: &str) -> ContentKind {
    if content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("json")) {
        return ContentKind::Json;
    }
    let path = location.split(['?', '#']).next().unwrap_or(location);
    if path.to_ascii_lowercase().ends_with(".json") {
        return ContentKind::Json;
    }
    match strip_bom(text).trim_start().chars().next() {
        Some('{') | Some('[') => ContentKind::Json,
        _ => ContentKind::Html,
    }
}

fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        format!("request failed: {}", e)
    }
}
