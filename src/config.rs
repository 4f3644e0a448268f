//! TOML configuration.
//!
//! Every section is optional; missing keys take the defaults below. A few
//! environment variables override the file so container deployments can run
//! without one:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `RESULTS_URL` | `source.url` |
//! | `DATA_DIR` | `data.dir` |
//! | `PORT` | `server.bind` (becomes `0.0.0.0:<PORT>`) |
//! | `FEEDBACK_WEBHOOK_URL` | `feedback.webhook_url` |
//! | `FEEDBACK_TOKEN` | `feedback.token` |
//!
//! ```toml
//! [source]
//! url = "https://www.courses-sur-sable.fr/live/"
//! format = "auto"          # auto | html | json
//! timeout_secs = 10
//!
//! [cache]
//! ttl_secs = 30
//! min_fetch_interval_secs = 10
//!
//! [server]
//! bind = "127.0.0.1:5000"
//!
//! [data]
//! dir = "./data"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sable_live_core::ContentKind;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Local path, `file://` URI, or `http(s)://` URL of the results.
    #[serde(default = "default_source_url")]
    pub url: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            format: default_format(),
            timeout_secs: default_source_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl SourceConfig {
    /// Forced content kind, or `None` for `auto`.
    pub fn forced_kind(&self) -> Option<ContentKind> {
        match self.format.as_str() {
            "html" => Some(ContentKind::Html),
            "json" => Some(ContentKind::Json),
            _ => None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_source_url() -> String {
    "https://www.courses-sur-sable.fr/live/".to_string()
}
fn default_format() -> String {
    "auto".to_string()
}
fn default_source_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    format!("sable-live/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_min_fetch_interval")]
    pub min_fetch_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            min_fetch_interval_secs: default_min_fetch_interval(),
        }
    }
}

fn default_ttl() -> u64 {
    30
}
fn default_min_fetch_interval() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedbackConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            token: None,
            timeout_secs: default_webhook_timeout(),
        }
    }
}

fn default_webhook_timeout() -> u64 {
    5
}

impl FeedbackConfig {
    /// The webhook is only used when both URL and token are set.
    pub fn webhook(&self) -> Option<(&str, &str)> {
        match (self.webhook_url.as_deref(), self.token.as_deref()) {
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => Some((url, token)),
            _ => None,
        }
    }
}

impl Config {
    /// Built-in defaults with environment overrides applied.
    pub fn minimal() -> Self {
        let mut config = Config::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Applies `RESULTS_URL`, `DATA_DIR`, `PORT`, `FEEDBACK_WEBHOOK_URL` and
    /// `FEEDBACK_TOKEN` as returned by `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup("RESULTS_URL") {
            self.source.url = url;
        }
        if let Some(dir) = lookup("DATA_DIR") {
            self.data.dir = PathBuf::from(dir);
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.trim().parse::<u16>().ok()) {
            self.server.bind = format!("0.0.0.0:{}", port);
        }
        if let Some(url) = lookup("FEEDBACK_WEBHOOK_URL") {
            self.feedback.webhook_url = Some(url);
        }
        if let Some(token) = lookup("FEEDBACK_TOKEN") {
            self.feedback.token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            anyhow::bail!("source.url must not be empty");
        }
        if self.source.timeout_secs == 0 {
            anyhow::bail!("source.timeout_secs must be > 0");
        }
        match self.source.format.as_str() {
            "auto" | "html" | "json" => {}
            other => anyhow::bail!(
                "Unknown source format: '{}'. Must be auto, html, or json.",
                other
            ),
        }
        if self.cache.ttl_secs == 0 {
            anyhow::bail!("cache.ttl_secs must be > 0");
        }
        Ok(())
    }
}

/// Reads and validates a TOML config file, then applies env overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;

    Ok(config)
}
