//! Time-bounded cache of the latest results snapshot.
//!
//! [`ResultCache::get`] decides on every call whether to refetch:
//!
//! 1. Not forced, the last fetch succeeded, and it is younger than the TTL:
//!    return the cached snapshot.
//! 2. The last fetch attempt (successful or not) is younger than the
//!    minimum fetch interval: return the cached state, even when forced or
//!    when the TTL has expired.
//! 3. Otherwise fetch and parse. Success replaces the snapshot and clears
//!    the error; failure keeps the previous snapshot and records the error.
//!
//! Callers never see an `Err`: failures surface as [`CacheRead::error`]
//! next to the last good snapshot (or an empty placeholder).
//!
//! The state lock is held across the fetch, so concurrent callers that
//! arrive during a refresh wait for it and then observe its result instead
//! of issuing their own upstream request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use sable_live_core::models::RawDocument;
use sable_live_core::parse::parse_document;
use sable_live_core::query::QueryEngine;
use sable_live_core::{ResultSnapshot, SourceError};

use crate::config::CacheConfig;
use crate::source::Fetch;

/// Monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Refresh thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub min_fetch_interval: Duration,
}

impl From<&CacheConfig> for CachePolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.ttl_secs),
            min_fetch_interval: Duration::from_secs(config.min_fetch_interval_secs),
        }
    }
}

/// What a caller gets back from the cache.
#[derive(Debug, Clone)]
pub struct CacheRead {
    pub snapshot: Arc<ResultSnapshot>,
    /// Message of the most recent failed fetch, cleared by the next success.
    pub error: Option<String>,
    /// Upstream status of the most recent fetch attempt (0 before any).
    pub status: u16,
}

impl CacheRead {
    /// Results are live when there is data and the last fetch succeeded.
    pub fn live_active(&self) -> bool {
        !self.snapshot.is_empty() && self.error.is_none()
    }

    pub fn query(&self) -> QueryEngine<'_> {
        QueryEngine::new(&self.snapshot)
    }
}

#[derive(Default)]
struct CacheState {
    last_fetch: Option<Instant>,
    snapshot: Option<Arc<ResultSnapshot>>,
    last_error: Option<String>,
    last_status: u16,
}

pub struct ResultCache {
    fetcher: Arc<dyn Fetch>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
    placeholder: Arc<ResultSnapshot>,
    state: Mutex<CacheState>,
}

impl ResultCache {
    pub fn new(fetcher: Arc<dyn Fetch>, policy: CachePolicy) -> Self {
        Self::with_clock(fetcher, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(fetcher: Arc<dyn Fetch>, policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        let placeholder = Arc::new(ResultSnapshot::empty(fetcher.source()));
        Self {
            fetcher,
            clock,
            policy,
            placeholder,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns the current snapshot, refreshing it first when the policy
    /// allows. `force` bypasses the TTL but not the minimum fetch interval.
    pub async fn get(&self, force: bool) -> CacheRead {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        if let Some(last) = state.last_fetch {
            let age = now.saturating_duration_since(last);
            let fresh = state.snapshot.is_some() && state.last_error.is_none();
            if !force && fresh && age < self.policy.ttl {
                debug!(age_ms = age.as_millis() as u64, "Serving cached snapshot");
                return self.read(&state);
            }
            if age < self.policy.min_fetch_interval {
                debug!(
                    age_ms = age.as_millis() as u64,
                    force, "Refetch suppressed by minimum fetch interval"
                );
                return self.read(&state);
            }
        }

        self.refresh(&mut state, now).await;
        self.read(&state)
    }

    /// Current state without ever fetching.
    pub async fn peek(&self) -> CacheRead {
        let state = self.state.lock().await;
        self.read(&state)
    }

    fn read(&self, state: &CacheState) -> CacheRead {
        CacheRead {
            snapshot: state
                .snapshot
                .clone()
                .unwrap_or_else(|| Arc::clone(&self.placeholder)),
            error: state.last_error.clone(),
            status: state.last_status,
        }
    }

    async fn refresh(&self, state: &mut CacheState, now: Instant) {
        let started = Instant::now();
        state.last_fetch = Some(now);

        let raw = match self.fetcher.fetch().await {
            Ok(raw) => raw,
            Err(err) => {
                let status = err.status().unwrap_or(0);
                self.record_failure(state, err, status);
                return;
            }
        };

        match self.build_snapshot(raw) {
            Ok(snapshot) => {
                info!(
                    source = %snapshot.source,
                    records = snapshot.len(),
                    status = snapshot.status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Results refreshed"
                );
                state.last_status = snapshot.status;
                state.last_error = None;
                state.snapshot = Some(Arc::new(snapshot));
            }
            Err((err, status)) => self.record_failure(state, err, status),
        }
    }

    fn build_snapshot(&self, raw: RawDocument) -> Result<ResultSnapshot, (SourceError, u16)> {
        let parsed = parse_document(raw.kind, &raw.text).map_err(|e| (e, raw.status))?;
        Ok(ResultSnapshot {
            records: parsed.records,
            fetched_at: Some(Utc::now()),
            status: raw.status,
            source: self.fetcher.source().to_string(),
            title: parsed.title,
            kind: Some(raw.kind),
        })
    }

    fn record_failure(&self, state: &mut CacheState, err: SourceError, status: u16) {
        warn!(
            source = self.fetcher.source(),
            status,
            kept_records = state.snapshot.as_ref().map_or(0, |s| s.len()),
            "Results refresh failed: {}",
            err
        );
        state.last_status = status;
        state.last_error = Some(err.to_string());
    }
}
