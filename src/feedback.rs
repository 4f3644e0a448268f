//! Flat-file visitor feedback: votes, comments and a visit counter.
//!
//! Layout under the data directory:
//!
//! | File | Content |
//! |------|---------|
//! | `votes.json` | `{"likes": 0, "dislikes": 0}` |
//! | `counter.json` | `{"visits": 0}` |
//! | `comments.txt` | one `unix_ts\|name\|message` line per comment |
//!
//! JSON files are rewritten atomically through a temp file in the same
//! directory. Each file has its own lock, held only around the file I/O.
//!
//! When a webhook URL and token are configured, vote and comment events are
//! also POSTed to it from a background task.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::FeedbackConfig;

const VOTES_FILE: &str = "votes.json";
const COUNTER_FILE: &str = "counter.json";
const COMMENTS_FILE: &str = "comments.txt";

const DEFAULT_NAME: &str = "Anonyme";
const NAME_MAX_CHARS: usize = 40;
const MESSAGE_MAX_CHARS: usize = 600;
const RECENT_COMMENTS: usize = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Votes {
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub dislikes: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct Counter {
    #[serde(default)]
    visits: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteKind {
    Like,
    Dislike,
}

impl VoteKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(VoteKind::Like),
            "dislike" => Some(VoteKind::Dislike),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VoteKind::Like => "like",
            VoteKind::Dislike => "dislike",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub timestamp: String,
    pub name: String,
    pub message: String,
}

impl Comment {
    fn to_line(&self) -> String {
        format!("{}|{}|{}", self.timestamp, self.name, self.message)
    }

    fn from_line(line: &str) -> Option<Self> {
        let mut parts = line.splitn(3, '|');
        let timestamp = parts.next()?;
        let name = parts.next()?;
        let message = parts.next()?;
        Some(Self {
            timestamp: timestamp.to_string(),
            name: name.to_string(),
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub likes: u64,
    pub dislikes: u64,
    pub visits: u64,
    pub comments: Vec<Comment>,
}

/// Trims, flattens line breaks to spaces, and truncates to `max_chars`.
pub fn sanitize_text(s: &str, max_chars: usize) -> String {
    s.trim()
        .replace(['\r', '\n'], " ")
        .chars()
        .take(max_chars)
        .collect()
}

pub struct FeedbackStore {
    dir: PathBuf,
    votes_lock: Mutex<()>,
    counter_lock: Mutex<()>,
    comments_lock: Mutex<()>,
}

impl FeedbackStore {
    /// Opens the store, creating the directory and any missing files.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;

        let store = Self {
            dir: dir.to_path_buf(),
            votes_lock: Mutex::new(()),
            counter_lock: Mutex::new(()),
            comments_lock: Mutex::new(()),
        };
        if !store.path(VOTES_FILE).exists() {
            store.write_json(VOTES_FILE, &Votes::default())?;
        }
        if !store.path(COUNTER_FILE).exists() {
            store.write_json(COUNTER_FILE, &Counter::default())?;
        }
        let comments = store.path(COMMENTS_FILE);
        if !comments.exists() {
            fs::write(&comments, "")
                .with_context(|| format!("Failed to create {}", comments.display()))?;
        }
        Ok(store)
    }

    /// Increments and returns the visit counter.
    pub fn record_visit(&self) -> Result<u64> {
        let _guard = lock(&self.counter_lock);
        let mut counter: Counter = self.read_json(COUNTER_FILE);
        counter.visits += 1;
        self.write_json(COUNTER_FILE, &counter)?;
        Ok(counter.visits)
    }

    pub fn vote(&self, kind: VoteKind) -> Result<Votes> {
        let _guard = lock(&self.votes_lock);
        let mut votes: Votes = self.read_json(VOTES_FILE);
        match kind {
            VoteKind::Like => votes.likes += 1,
            VoteKind::Dislike => votes.dislikes += 1,
        }
        self.write_json(VOTES_FILE, &votes)?;
        Ok(votes)
    }

    /// Appends a comment. Returns `Ok(None)` when the sanitized message is
    /// empty, in which case nothing is stored.
    pub fn add_comment(&self, name: Option<&str>, message: &str) -> Result<Option<Comment>> {
        let message = sanitize_text(message, MESSAGE_MAX_CHARS);
        if message.is_empty() {
            return Ok(None);
        }
        // A pipe in the name would shift the message into the name column.
        let name = sanitize_text(name.unwrap_or(DEFAULT_NAME), NAME_MAX_CHARS).replace('|', "/");
        let comment = Comment {
            timestamp: chrono::Utc::now().timestamp().to_string(),
            name,
            message,
        };

        let _guard = lock(&self.comments_lock);
        let path = self.path(COMMENTS_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        writeln!(file, "{}", comment.to_line())
            .with_context(|| format!("Failed to append to {}", path.display()))?;

        Ok(Some(comment))
    }

    /// The last well-formed comment lines, oldest first.
    pub fn recent_comments(&self) -> Vec<Comment> {
        let _guard = lock(&self.comments_lock);
        let content = fs::read_to_string(self.path(COMMENTS_FILE)).unwrap_or_default();
        let comments: Vec<Comment> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(Comment::from_line)
            .collect();
        let skip = comments.len().saturating_sub(RECENT_COMMENTS);
        comments.into_iter().skip(skip).collect()
    }

    pub fn votes(&self) -> Votes {
        let _guard = lock(&self.votes_lock);
        self.read_json(VOTES_FILE)
    }

    pub fn visits(&self) -> u64 {
        let _guard = lock(&self.counter_lock);
        self.read_json::<Counter>(COUNTER_FILE).visits
    }

    pub fn stats(&self) -> Stats {
        let votes = self.votes();
        Stats {
            likes: votes.likes,
            dislikes: votes.dislikes,
            visits: self.visits(),
            comments: self.recent_comments(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Missing or corrupt files read as zeroed counters.
    fn read_json<T: for<'de> Deserialize<'de> + Default>(&self, name: &str) -> T {
        let path = self.path(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %path.display(), "Reading feedback file failed: {}", e);
                return T::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), "Corrupt feedback file, starting from zero: {}", e);
            T::default()
        })
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.path(name);
        let mut tmp = tempfile::Builder::new()
            .prefix(".tmp_")
            .tempfile_in(&self.dir)
            .with_context(|| format!("Failed to create temp file in {}", self.dir.display()))?;
        serde_json::to_writer(&mut tmp, value)?;
        tmp.flush()?;
        tmp.persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

fn lock(m: &Mutex<()>) -> MutexGuard<'_, ()> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outbound notifier for vote and comment events.
#[derive(Clone)]
pub struct Webhook {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl Webhook {
    /// `None` unless both URL and token are configured.
    pub fn from_config(config: &FeedbackConfig) -> Result<Option<Self>> {
        let Some((url, token)) = config.webhook() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Some(Self {
            client,
            url: url.to_string(),
            token: token.to_string(),
        }))
    }

    /// Sends `event` with the token and caller details in the background.
    /// Failures are only logged.
    pub fn notify(&self, mut event: serde_json::Value, user_agent: &str, ip: &str) {
        if let Some(obj) = event.as_object_mut() {
            obj.insert("token".into(), self.token.clone().into());
            obj.insert("userAgent".into(), user_agent.into());
            obj.insert("ip".into(), ip.into());
        }
        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&event).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    warn!(status = resp.status().as_u16(), "Feedback webhook rejected event");
                }
                Ok(_) => debug!("Feedback webhook delivered"),
                Err(e) => warn!("Feedback webhook failed: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_files() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("data");
        let store = FeedbackStore::open(&dir).unwrap();

        let votes: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join(VOTES_FILE)).unwrap()).unwrap();
        assert_eq!(votes, serde_json::json!({"likes": 0, "dislikes": 0}));
        assert!(dir.join(COUNTER_FILE).exists());
        assert_eq!(fs::read_to_string(dir.join(COMMENTS_FILE)).unwrap(), "");
        assert_eq!(store.visits(), 0);
    }

    #[test]
    fn test_votes_and_visits_persist_across_instances() {
        let tmp = TempDir::new().unwrap();
        {
            let store = FeedbackStore::open(tmp.path()).unwrap();
            store.vote(VoteKind::Like).unwrap();
            store.vote(VoteKind::Like).unwrap();
            store.vote(VoteKind::Dislike).unwrap();
            assert_eq!(store.record_visit().unwrap(), 1);
            assert_eq!(store.record_visit().unwrap(), 2);
        }
        let store = FeedbackStore::open(tmp.path()).unwrap();
        assert_eq!(store.votes(), Votes { likes: 2, dislikes: 1 });
        assert_eq!(store.visits(), 2);
    }

    #[test]
    fn test_vote_kind_parse() {
        assert_eq!(VoteKind::parse("like"), Some(VoteKind::Like));
        assert_eq!(VoteKind::parse("dislike"), Some(VoteKind::Dislike));
        assert_eq!(VoteKind::parse("LIKE"), None);
        assert_eq!(VoteKind::parse("love"), None);
    }

    #[test]
    fn test_comment_sanitized_and_stored() {
        let tmp = TempDir::new().unwrap();
        let store = FeedbackStore::open(tmp.path()).unwrap();

        let long_name = "x".repeat(60);
        let comment = store
            .add_comment(Some(&long_name), "  great\r\nrace  ")
            .unwrap()
            .unwrap();
        assert_eq!(comment.name.chars().count(), 40);
        assert_eq!(comment.message, "great  race");

        let anon = store.add_comment(None, "a|b").unwrap().unwrap();
        assert_eq!(anon.name, "Anonyme");

        let recent = store.recent_comments();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].message, "a|b");
        assert_eq!(recent[1].name, "Anonyme");
    }

    #[test]
    fn test_empty_comment_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = FeedbackStore::open(tmp.path()).unwrap();
        assert!(store.add_comment(Some("Paul"), "  \n ").unwrap().is_none());
        assert!(store.recent_comments().is_empty());
    }

    #[test]
    fn test_pipe_in_name_does_not_corrupt_line() {
        let tmp = TempDir::new().unwrap();
        let store = FeedbackStore::open(tmp.path()).unwrap();
        store.add_comment(Some("a|b"), "hello").unwrap();
        let recent = store.recent_comments();
        assert_eq!(recent[0].name, "a/b");
        assert_eq!(recent[0].message, "hello");
    }

    #[test]
    fn test_recent_comments_keeps_last_twenty_well_formed() {
        let tmp = TempDir::new().unwrap();
        let store = FeedbackStore::open(tmp.path()).unwrap();
        let mut content = String::from("garbage line\n\n");
        for i in 0..25 {
            content.push_str(&format!("{}|p{}|m{}\n", 1000 + i, i, i));
        }
        fs::write(tmp.path().join(COMMENTS_FILE), content).unwrap();

        let recent = store.recent_comments();
        assert_eq!(recent.len(), 20);
        assert_eq!(recent[0].name, "p5");
        assert_eq!(recent[19].message, "m24");
    }

    #[test]
    fn test_corrupt_counter_restarts_from_zero() {
        let tmp = TempDir::new().unwrap();
        let store = FeedbackStore::open(tmp.path()).unwrap();
        fs::write(tmp.path().join(COUNTER_FILE), "{oops").unwrap();
        assert_eq!(store.record_visit().unwrap(), 1);
    }

    #[test]
    fn test_stats() {
        let tmp = TempDir::new().unwrap();
        let store = FeedbackStore::open(tmp.path()).unwrap();
        store.vote(VoteKind::Dislike).unwrap();
        store.record_visit().unwrap();
        store.add_comment(Some("Lea"), "Allez!").unwrap();

        let stats = store.stats();
        assert_eq!(stats.likes, 0);
        assert_eq!(stats.dislikes, 1);
        assert_eq!(stats.visits, 1);
        assert_eq!(stats.comments.len(), 1);
        assert_eq!(stats.comments[0].name, "Lea");
    }

    #[test]
    fn test_sanitize_text_counts_chars() {
        assert_eq!(sanitize_text("  éééé  ", 2), "éé");
        assert_eq!(sanitize_text("", 10), "");
    }

    #[test]
    fn test_webhook_requires_url_and_token() {
        let mut config = FeedbackConfig::default();
        assert!(Webhook::from_config(&config).unwrap().is_none());
        config.webhook_url = Some("http://127.0.0.1:9/hook".into());
        assert!(Webhook::from_config(&config).unwrap().is_none());
        config.token = Some("secret".into());
        assert!(Webhook::from_config(&config).unwrap().is_some());
    }
}
