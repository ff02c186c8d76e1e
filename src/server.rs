//! HTTP question-answering server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question from the ingested handbooks |
//! | `GET`  | `/status` | Row counts: documents, chunks, embeddings |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Error responses share one envelope:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Codes: `bad_request` (400), `generation_failed` (500), and `internal`
//! (500). Internal responses carry a generic message; the underlying error
//! is logged server-side and never forwarded to clients.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front ends
//! can call the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::answer::{answer_question, create_generator, Generator};
use crate::config::Config;
use crate::db;
use crate::embedding::{create_embedder, Embedder};
use crate::migrate;
use crate::models::{Answer, StoreStatus};
use crate::retrieve::retrieve_top_k;
use crate::store::VectorStore;

/// Shared application state passed to route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
}

/// Start the server on `[server].bind`. Backends are constructed up front
/// so a misconfigured provider fails at startup, not on the first request.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;

    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(VectorStore::new(pool)),
        embedder: create_embedder(&config.embedding)?,
        generator: create_generator(&config.generation)?.into(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ask", post(handle_ask))
        .route("/status", get(handle_status))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("Server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

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

/// 500 with a generic body; the real error goes to the server log only.
fn internal(err: crate::error::RagError) -> AppError {
    eprintln!("Error: {err}");
    let code = match err {
        crate::error::RagError::Generation(_) => "generation_failed",
        _ => "internal",
    };
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: code.to_string(),
        message: "Internal server error".to_string(),
    }
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    k: Option<i64>,
}

/// Answer a question: validate, retrieve top-k, generate a grounded
/// answer with citations. Blank questions are rejected before any
/// embedding call is made.
async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Answer>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let k = req.k.unwrap_or(state.config.retrieval.top_k);
    if k < 1 {
        return Err(bad_request("k must be >= 1"));
    }

    let chunks = retrieve_top_k(
        state.embedder.as_ref(),
        &state.store,
        &req.question,
        k,
    )
    .await
    .map_err(internal)?;

    let answer = answer_question(state.generator.as_ref(), &req.question, &chunks)
        .await
        .map_err(internal)?;

    Ok(Json(answer))
}

// ============ GET /status ============

async fn handle_status(State(state): State<AppState>) -> Result<Json<StoreStatus>, AppError> {
    let status = state.store.status().await.map_err(internal)?;
    Ok(Json(status))
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
