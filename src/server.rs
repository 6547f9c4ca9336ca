//! HTTP ingress.
//!
//! A small axum app exposing the webhook endpoint plus read-only lookup,
//! search, and review-queue management routes. The webhook path is guarded
//! by an optional shared secret and a per-client sliding-window rate limit;
//! the note is stored before the bucket handler runs, so a handler failure
//! never loses the note.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::actions::{dispatch, HandlerContext};
use crate::classify;
use crate::config::Config;
use crate::crm::{build_visit_store, VisitStore};
use crate::index::NoteIndex;
use crate::models::{Bucket, Note, ReviewReason};
use crate::payload;
use crate::review::{find_matches, ReviewQueue};

// ============ Errors ============

/// Request-level error rendered as `{"error": {"code", "message"}}`.
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> AppError {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> AppError {
        AppError {
            status: StatusCode::UNAUTHORIZED,
            code: "unauthorized",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> AppError {
        AppError {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> AppError {
        AppError {
            status: StatusCode::TOO_MANY_REQUESTS,
            code: "rate_limited",
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> AppError {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> AppError {
        eprintln!("Internal error: {:#}", e);
        AppError::internal(e.to_string())
    }
}

// ============ Rate limiting ============

/// Sliding-window rate limiter keyed by client identity. Timestamps older
/// than the window are dropped on every check.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    hits: std::sync::Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> RateLimiter {
        RateLimiter {
            max_requests,
            window,
            hits: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Record a request for `identity` and report whether it is allowed.
    pub fn allow(&self, identity: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        let timestamps = hits.entry(identity.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);
        if timestamps.len() >= self.max_requests {
            return false;
        }
        timestamps.push(now);
        true
    }
}

/// Client identity for rate limiting: `x-client-id`, then the first hop of
/// `x-forwarded-for`, then a shared default.
fn client_identity(headers: &HeaderMap) -> String {
    if let Some(id) = headers.get("x-client-id").and_then(|v| v.to_str().ok()) {
        return id.to_string();
    }
    if let Some(fwd) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = fwd.split(',').next() {
            return first.trim().to_string();
        }
    }
    "default".to_string()
}

// ============ State ============

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub index: Arc<Mutex<NoteIndex>>,
    pub queue: Arc<Mutex<ReviewQueue>>,
    pub visits: Arc<dyn VisitStore>,
    pub handlers: Arc<HandlerContext>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Build the full state from config: flat files loaded, backends wired.
    pub fn from_config(config: Arc<Config>) -> Result<AppState> {
        let index = NoteIndex::load(&config.data.index_file())?;
        let queue = ReviewQueue::load(&config.data.queue_file())?;
        let visits = build_visit_store(&config)?;
        let handlers = HandlerContext::from_config(config.clone())?;
        Ok(AppState::with_parts(config, index, queue, visits, handlers))
    }

    /// Assemble state from explicit parts. Used by tests.
    pub fn with_parts(
        config: Arc<Config>,
        index: NoteIndex,
        queue: ReviewQueue,
        visits: Arc<dyn VisitStore>,
        handlers: HandlerContext,
    ) -> AppState {
        let limiter = RateLimiter::new(
            config.server.rate_limit_requests,
            Duration::from_secs(config.server.rate_limit_window_secs),
        );
        AppState {
            config,
            index: Arc::new(Mutex::new(index)),
            queue: Arc::new(Mutex::new(queue)),
            visits,
            handlers: Arc::new(handlers),
            limiter: Arc::new(limiter),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(health))
        .route("/notes/search", get(search_notes))
        .route("/notes/recent", get(recent_notes))
        .route("/notes/{hash}", get(get_note))
        .route("/reviews", get(list_reviews))
        .route("/reviews/stats", get(review_stats))
        .route("/reviews/{id}/assign", post(assign_review))
        .route("/reviews/{id}/dismiss", post(dismiss_review))
        .route("/businesses/{name}/notes", get(business_notes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(config: Config) -> Result<()> {
    let bind = config.server.bind.clone();
    let state = AppState::from_config(Arc::new(config))?;
    let app = router(state);

    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server terminated")?;
    Ok(())
}

// ============ Webhook ============

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let started = Instant::now();

    if let Some(secret) = &state.config.server.webhook_secret {
        let provided = headers
            .get("x-webhook-secret")
            .and_then(|v| v.to_str().ok());
        if provided != Some(secret.as_str()) {
            return Err(AppError::unauthorized("Invalid webhook secret"));
        }
    }

    let identity = client_identity(&headers);
    if !state.limiter.allow(&identity) {
        return Err(AppError::rate_limited("Too many requests"));
    }

    let note = payload::normalize(&payload, Utc::now())
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    println!("Received memo {} ({})", note.recording_id, note.hash);

    let bucket = classify::classify(&note);

    // Store first: the note survives even if every downstream effect fails.
    {
        let mut index = state.index.lock().await;
        index.store(&note, bucket)?;
    }

    let result = dispatch(&state.handlers, bucket, &note).await;

    let review = if bucket == Bucket::Comcast && result.needs_review {
        enqueue_for_review(&state, &note).await?
    } else {
        None
    };

    let mut body = json!({
        "success": true,
        "hash": note.hash,
        "bucket": bucket,
        "recordingId": note.recording_id,
        "referenceUrl": format!("/notes/{}", note.hash),
        "actions": result,
        "processingMs": started.elapsed().as_millis() as u64,
    });
    if let Some(review) = review {
        body["review"] = review;
    }

    Ok(Json(body))
}

/// Park an unmatched note in the review queue with scored suggestions.
///
/// The reason encodes the candidate count: none, exactly one (likely but
/// unconfirmed), or several. A visit-pool fetch failure still enqueues, with
/// reason `error` and no suggestions. A note with an open entry is not
/// re-enqueued.
async fn enqueue_for_review(state: &AppState, note: &Note) -> Result<Option<Value>, AppError> {
    let mut queue = state.queue.lock().await;

    if queue.has_open_entry(&note.hash) {
        println!("Note {} already pending review, skipping enqueue", note.hash);
        return Ok(None);
    }

    let (reason, matches) = match state.visits.fetch().await {
        Ok(visits) => {
            let matches = find_matches(note, &visits);
            let reason = match matches.len() {
                0 => ReviewReason::NoMatch,
                1 => ReviewReason::LowConfidence,
                _ => ReviewReason::MultipleMatches,
            };
            (reason, matches)
        }
        Err(e) => {
            eprintln!("Visit pool fetch failed: {:#}", e);
            (ReviewReason::Error, Vec::new())
        }
    };

    let entry = queue.enqueue(note, Bucket::Comcast, reason, matches)?;
    Ok(Some(json!({
        "reviewId": entry.id,
        "reason": entry.reason,
        "suggestedMatches": entry.suggested_matches.len(),
    })))
}

// ============ Read endpoints ============

async fn health(State(state): State<AppState>) -> Json<Value> {
    let notes = state.index.lock().await.len();
    let pending = state.queue.lock().await.stats().pending;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "notes": notes,
        "pendingReviews": pending,
    }))
}

async fn get_note(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<Value>, AppError> {
    let index = state.index.lock().await;
    let meta = index
        .lookup(&hash)
        .ok_or_else(|| AppError::not_found(format!("No note with hash {}", hash)))?;
    Ok(Json(json!({ "note": meta })))
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    bucket: Option<String>,
    limit: Option<usize>,
}

fn parse_bucket(raw: Option<&str>) -> Result<Option<Bucket>, AppError> {
    match raw {
        None => Ok(None),
        Some(s) => Bucket::parse(s)
            .map(Some)
            .ok_or_else(|| AppError::bad_request(format!("Unknown bucket: {}", s))),
    }
}

async fn search_notes(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, AppError> {
    let query = params
        .q
        .as_deref()
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Missing query parameter: q"))?;
    let bucket = parse_bucket(params.bucket.as_deref())?;

    let index = state.index.lock().await;
    let mut results = index.search(query, bucket);
    if let Some(limit) = params.limit {
        results.truncate(limit);
    }
    Ok(Json(json!({ "count": results.len(), "results": results })))
}

async fn recent_notes(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, AppError> {
    let bucket = parse_bucket(params.bucket.as_deref())?;
    let limit = params.limit.unwrap_or(20);

    let index = state.index.lock().await;
    let results = index.recent(limit, bucket);
    Ok(Json(json!({ "count": results.len(), "results": results })))
}

async fn business_notes(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let index = state.index.lock().await;
    let mut results = index.search(&name, Some(Bucket::Comcast));

    // Notes resolved through the review queue may not mention the business
    // by name, so assigned entries are folded in by hash.
    let queue = state.queue.lock().await;
    let target = name.to_lowercase();
    for entry in queue.assigned_to_business(&target) {
        if !results.iter().any(|m| m.hash == entry.hash) {
            if let Some(meta) = index.lookup(&entry.hash) {
                results.push(meta.clone());
            }
        }
    }

    Ok(Json(json!({
        "business": name,
        "count": results.len(),
        "results": results,
    })))
}

// ============ Review endpoints ============

async fn list_reviews(State(state): State<AppState>) -> Json<Value> {
    let queue = state.queue.lock().await;
    let pending = queue.pending();
    Json(json!({ "count": pending.len(), "reviews": pending }))
}

async fn review_stats(State(state): State<AppState>) -> Json<Value> {
    let queue = state.queue.lock().await;
    Json(json!(queue.stats()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignBody {
    visit_id: String,
    business_name: String,
}

async fn assign_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AssignBody>,
) -> Result<Json<Value>, AppError> {
    let mut queue = state.queue.lock().await;
    let entry = queue
        .assign(&id, &body.visit_id, &body.business_name)?
        .ok_or_else(|| AppError::not_found(format!("No review entry with id {}", id)))?;
    Ok(Json(json!({ "success": true, "review": entry })))
}

async fn dismiss_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let mut queue = state.queue.lock().await;
    let entry = queue
        .dismiss(&id)?
        .ok_or_else(|| AppError::not_found(format!("No review entry with id {}", id)))?;
    Ok(Json(json!({ "success": true, "review": entry })))
}
