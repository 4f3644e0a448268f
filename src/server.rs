//! HTTP API over the result cache and the feedback store.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status, version and upstream state (never fetches) |
//! | `GET`  | `/api/meta` | Snapshot metadata |
//! | `GET`  | `/api/pilots?force=` | Every record |
//! | `GET`  | `/api/pilot/{id}` | One record by bib number |
//! | `GET`  | `/api/search?q=` | Ranked structured search |
//! | `POST` | `/api/search` | Free-text row search, `{"q": "..."}` |
//! | `GET`  | `/` | Records a visit, returns feedback stats |
//! | `GET`  | `/api/stats` | Feedback stats |
//! | `POST` | `/api/vote` | `{"type": "like" \| "dislike"}` |
//! | `POST` | `/api/comment` | `{"name": "...", "message": "..."}` |
//!
//! Upstream failures never turn into HTTP errors: responses carry the best
//! available snapshot plus an `error` field.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the static results
//! page can be served from anywhere.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use sable_live_core::query::ResultRow;
use sable_live_core::{ContentKind, PilotRecord};

use crate::cache::{CachePolicy, ResultCache};
use crate::config::Config;
use crate::feedback::{FeedbackStore, Stats, VoteKind, Webhook};
use crate::source::SourceFetcher;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ResultCache>,
    pub feedback: Arc<FeedbackStore>,
    pub webhook: Option<Webhook>,
}

impl AppState {
    /// Wires the production fetcher, cache, feedback store and webhook.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let fetcher = Arc::new(SourceFetcher::new(&config.source)?);
        let cache = ResultCache::new(fetcher, CachePolicy::from(&config.cache));
        let feedback = FeedbackStore::open(&config.data.dir)?;
        Ok(Self {
            cache: Arc::new(cache),
            feedback: Arc::new(feedback),
            webhook: Webhook::from_config(&config.feedback)?,
        })
    }
}

/// Starts the server and blocks until it shuts down.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(
        bind = %bind_addr,
        source = %config.source.url,
        data_dir = %config.data.dir.display(),
        "Server listening"
    );
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/api/meta", get(handle_meta))
        .route("/api/pilots", get(handle_pilots))
        .route("/api/pilot/{id}", get(handle_pilot))
        .route("/api/search", get(handle_search).post(handle_search_text))
        .route("/api/stats", get(handle_stats))
        .route("/api/vote", post(handle_vote))
        .route("/api/comment", post(handle_comment))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Feedback file I/O failures.
fn internal(err: anyhow::Error) -> AppError {
    error!("Feedback store failure: {:#}", err);
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: "failed to update feedback data".to_string(),
    }
}

/// Request bodies are parsed leniently: a missing or malformed body reads
/// as the default, so validation reports what is actually missing.
fn lenient_json<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    upstream_status: u16,
    last_error: Option<String>,
    records: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let read = state.cache.peek().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        upstream_status: read.status,
        last_error: read.error,
        records: read.snapshot.len(),
    })
}

// ============ GET /api/meta ============

#[derive(Serialize)]
struct MetaResponse {
    ok: bool,
    source: String,
    title: Option<String>,
    kind: Option<ContentKind>,
    fetched_at: Option<DateTime<Utc>>,
    status: u16,
    error: Option<String>,
    count: usize,
    live_active: bool,
}

async fn handle_meta(State(state): State<AppState>) -> Json<MetaResponse> {
    let read = state.cache.get(false).await;
    let live_active = read.live_active();
    let snapshot = &read.snapshot;
    Json(MetaResponse {
        ok: true,
        source: snapshot.source.clone(),
        title: snapshot.title.clone(),
        kind: snapshot.kind,
        fetched_at: snapshot.fetched_at,
        status: read.status,
        count: snapshot.len(),
        error: read.error,
        live_active,
    })
}

// ============ GET /api/pilots ============

#[derive(Deserialize)]
struct PilotsParams {
    #[serde(default)]
    force: bool,
}

#[derive(Serialize)]
struct PilotsResponse<'a> {
    ok: bool,
    pilots: &'a [PilotRecord],
    error: Option<&'a str>,
    status: u16,
}

async fn handle_pilots(
    State(state): State<AppState>,
    Query(params): Query<PilotsParams>,
) -> Response {
    let read = state.cache.get(params.force).await;
    Json(PilotsResponse {
        ok: true,
        pilots: read.query().all(),
        error: read.error.as_deref(),
        status: read.status,
    })
    .into_response()
}

// ============ GET /api/pilot/{id} ============

async fn handle_pilot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let read = state.cache.get(false).await;
    let id = id.trim();
    match read.query().by_identifier(id) {
        Some(pilot) => Ok(Json(json!({ "ok": true, "pilot": pilot })).into_response()),
        None => Err(not_found(format!("no pilot with number '{}'", id))),
    }
}

// ============ GET /api/search ============

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct SearchResponse {
    ok: bool,
    query: String,
    results: Vec<ResultRow>,
    error: Option<String>,
    live_active: bool,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let read = state.cache.get(false).await;
    let results = read.query().search(&params.q);
    Json(SearchResponse {
        ok: true,
        query: params.q.trim().to_string(),
        results,
        live_active: read.live_active(),
        error: read.error,
    })
}

// ============ POST /api/search ============

#[derive(Deserialize, Default)]
struct SearchBody {
    #[serde(default)]
    q: Option<String>,
}

#[derive(Serialize)]
struct SearchTextResponse {
    ok: bool,
    results: Vec<String>,
    error: Option<String>,
}

async fn handle_search_text(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SearchTextResponse>, AppError> {
    let body: SearchBody = lenient_json(&body);
    let query = body.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(bad_request("query required"));
    }

    let read = state.cache.get(false).await;
    Ok(Json(SearchTextResponse {
        ok: true,
        results: read.query().search_text(&query),
        error: read.error,
    }))
}

// ============ Feedback ============

async fn handle_index(State(state): State<AppState>) -> Result<Json<Stats>, AppError> {
    state.feedback.record_visit().map_err(internal)?;
    Ok(Json(state.feedback.stats()))
}

async fn handle_stats(State(state): State<AppState>) -> Json<Stats> {
    Json(state.feedback.stats())
}

#[derive(Deserialize, Default)]
struct VoteBody {
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

async fn handle_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let body: VoteBody = lenient_json(&body);
    let kind = body
        .kind
        .as_deref()
        .and_then(VoteKind::parse)
        .ok_or_else(|| bad_request("type must be 'like' or 'dislike'"))?;

    let votes = state.feedback.vote(kind).map_err(internal)?;
    notify(
        &state,
        &headers,
        json!({ "type": "vote", "action": kind.as_str() }),
    );

    Ok(Json(json!({
        "ok": true,
        "likes": votes.likes,
        "dislikes": votes.dislikes,
    })))
}

#[derive(Deserialize, Default)]
struct CommentBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

async fn handle_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let body: CommentBody = lenient_json(&body);
    let comment = state
        .feedback
        .add_comment(body.name.as_deref(), body.message.as_deref().unwrap_or_default())
        .map_err(internal)?
        .ok_or_else(|| bad_request("message required"))?;

    notify(
        &state,
        &headers,
        json!({ "type": "comment", "name": comment.name, "message": comment.message }),
    );

    Ok(Json(json!({ "ok": true })))
}

fn notify(state: &AppState, headers: &HeaderMap, event: serde_json::Value) {
    let Some(webhook) = &state.webhook else {
        return;
    };
    webhook.notify(
        event,
        header_str(headers, USER_AGENT.as_str()),
        header_str(headers, "x-forwarded-for"),
    );
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
