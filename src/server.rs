//! HTTP service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/ingest` | Ingest the tree under `{ "node_id" }` |
//! | `POST`   | `/search` | Similarity search, `{ "query", "top_k"? }` |
//! | `POST`   | `/seed`   | Load the demo corpus |
//! | `DELETE` | `/clear`  | Delete every indexed chunk |
//!
//! `/ingest` answers 200 with `success: false` when the walk or the sink
//! fails; only malformed requests and setup problems produce error bodies.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use pagetree_core::error::SinkError;

use crate::config::Config;
use crate::ingest::{ingest_with, IngestReport};
use crate::notion::NotionFetcher;
use crate::search::{search_with, InvalidQuery, SearchResponse};
use crate::seed::{clear_with, seed_with, ClearResponse, SeedResponse};
use crate::sqlite_sink::SqliteSink;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    sink: Arc<SqliteSink>,
}

impl AppState {
    /// Open the index and make sure its schema exists.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let sink = SqliteSink::connect(config).await?;
        Ok(Self {
            config: Arc::new(config.clone()),
            sink: Arc::new(sink),
        })
    }
}

/// The service's routes with CORS and request tracing applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/ingest", post(handle_ingest))
        .route("/search", post(handle_search))
        .route("/seed", post(handle_seed))
        .route("/clear", delete(handle_clear))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config).await?;
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("pagetree server listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    axum::serve(listener, router(state)).await?;
    Ok(())
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

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Caller mistakes become 400s. Everything else is a 500.
fn classify(err: anyhow::Error) -> AppError {
    if err.downcast_ref::<InvalidQuery>().is_some() {
        return bad_request(err.to_string());
    }
    if let Some(SinkError::InvalidRequest(msg)) = err.downcast_ref::<SinkError>() {
        return bad_request(msg.clone());
    }
    tracing::warn!("request failed: {:#}", err);
    internal(format!("{:#}", err))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    node_id: String,
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestReport>, AppError> {
    let node_id = req.node_id.trim();
    if node_id.is_empty() {
        return Err(bad_request("node_id must not be empty"));
    }

    let fetcher = NotionFetcher::from_config(&state.config.notion).map_err(classify)?;
    let report = ingest_with(
        &fetcher,
        state.sink.as_ref(),
        node_id,
        state.config.chunking.guard(),
    )
    .await;
    Ok(Json(report))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    search_with(
        state.sink.as_ref(),
        &state.config.retrieval,
        &req.query,
        req.top_k,
    )
    .await
    .map(Json)
    .map_err(classify)
}

// ============ POST /seed, DELETE /clear ============

async fn handle_seed(State(state): State<AppState>) -> Result<Json<SeedResponse>, AppError> {
    seed_with(state.sink.as_ref()).await.map(Json).map_err(classify)
}

async fn handle_clear(State(state): State<AppState>) -> Result<Json<ClearResponse>, AppError> {
    clear_with(state.sink.as_ref()).await.map(Json).map_err(classify)
}
