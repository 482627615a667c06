//! HTTP retrieval server.
//!
//! Exposes the retriever to the conversation layer over a small JSON API.
//! Indexes are loaded once at startup into the retriever's registry;
//! requests run the CPU-bound search on tokio's blocking pool.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/agents` | Configured agents, whether each is loaded, index stats |
//! | `POST` | `/retrieve` | Search one agent |
//! | `POST` | `/retrieve/multi` | Search several agents independently |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "top_k must be >= 1" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500). An unknown agent or
//! an agent without a knowledge base is not an error; it yields no citations.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::citation::Citation;
use crate::config::Config;
use crate::index::IndexStats;
use crate::retrieve::Retriever;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    retriever: Arc<Retriever>,
}

impl AppState {
    pub fn new(retriever: Arc<Retriever>) -> Self {
        Self { retriever }
    }
}

/// Starts the retrieval server on `[server].bind`. Runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = config.clone();
    let retriever = tokio::task::spawn_blocking(move || Retriever::from_config(&config)).await??;

    let loaded = retriever.available_agents();
    info!(
        "loaded knowledge bases for {} agent(s): {}",
        loaded.len(),
        loaded.join(", ")
    );

    let app = router(AppState::new(Arc::new(retriever)));

    println!("Retrieval server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/agents", get(handle_agents))
        .route("/retrieve", post(handle_retrieve))
        .route("/retrieve/multi", post(handle_retrieve_multi))
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

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
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

fn validate_params(top_k: Option<usize>, min_similarity: Option<f32>) -> Result<(), AppError> {
    if top_k == Some(0) {
        return Err(bad_request("top_k must be >= 1"));
    }
    if let Some(min) = min_similarity {
        if !(-1.0..=1.0).contains(&min) {
            return Err(bad_request("min_similarity must be in [-1.0, 1.0]"));
        }
    }
    Ok(())
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

// ============ GET /agents ============

#[derive(Serialize)]
pub struct AgentInfo {
    pub agent: String,
    pub loaded: bool,
    pub stats: Option<IndexStats>,
}

#[derive(Serialize)]
pub struct AgentsResponse {
    pub agents: Vec<AgentInfo>,
}

async fn handle_agents(State(state): State<AppState>) -> Json<AgentsResponse> {
    let mut stats = state.retriever.knowledge_stats();
    let agents = state
        .retriever
        .agents()
        .names()
        .iter()
        .map(|name| {
            let stats = stats.remove(name);
            AgentInfo {
                agent: name.clone(),
                loaded: stats.is_some(),
                stats,
            }
        })
        .collect();
    Json(AgentsResponse { agents })
}

// ============ POST /retrieve ============

#[derive(Debug, Deserialize)]
pub struct RetrieveRequest {
    pub agent: String,
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub min_similarity: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct RetrieveResponse {
    pub agent: String,
    pub citations: Vec<Citation>,
}

async fn handle_retrieve(
    State(state): State<AppState>,
    Json(req): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>, AppError> {
    validate_params(req.top_k, req.min_similarity)?;

    let agent = state
        .retriever
        .agents()
        .resolve(&req.agent)
        .unwrap_or(req.agent.as_str())
        .to_string();

    let retriever = state.retriever.clone();
    let citations = tokio::task::spawn_blocking(move || {
        retriever.retrieve(&req.agent, &req.query, req.top_k, req.min_similarity)
    })
    .await
    .map_err(|e| internal(format!("retrieval task failed: {}", e)))?;

    Ok(Json(RetrieveResponse { agent, citations }))
}

// ============ POST /retrieve/multi ============

#[derive(Debug, Deserialize)]
pub struct MultiRetrieveRequest {
    pub query: String,
    /// Defaults to every agent with a loaded knowledge base.
    #[serde(default)]
    pub agents: Option<Vec<String>>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MultiRetrieveResponse {
    pub results: BTreeMap<String, Vec<Citation>>,
}

async fn handle_retrieve_multi(
    State(state): State<AppState>,
    Json(req): Json<MultiRetrieveRequest>,
) -> Result<Json<MultiRetrieveResponse>, AppError> {
    validate_params(req.top_k, None)?;

    let retriever = state.retriever.clone();
    let results = tokio::task::spawn_blocking(move || {
        let agents = req
            .agents
            .unwrap_or_else(|| retriever.available_agents());
        retriever.retrieve_multi(&req.query, &agents, req.top_k)
    })
    .await
    .map_err(|e| internal(format!("retrieval task failed: {}", e)))?;

    Ok(Json(MultiRetrieveResponse { results }))
}
