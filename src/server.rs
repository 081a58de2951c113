//! HTTP API server.
//!
//! Exposes sessions, ingestion and the two generators as a JSON API under
//! `/api`, for the browser front-end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/session/start` | Issue a new session id |
//! | `DELETE` | `/api/session/{id}` | Drop a session's uploads and collection |
//! | `POST` | `/api/ingest` | Multipart upload (`files`), `session-id` header |
//! | `POST` | `/api/generate-tests` | `{query, session_id}` → `{result}` |
//! | `POST` | `/api/generate-script` | `{test_case, session_id}` → `{script}` |
//! | `GET`  | `/api/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "No HTML file found for this session. ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `generation_failed` (502), `internal` (500).
//!
//! With `generation.sentinel_errors = true`, failed generations instead
//! answer `200` with the legacy sentinel text in `result` / `script`.
//!
//! # CORS
//!
//! Only the origins listed in `[server].cors_origins` are allowed.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::config::Config;
use crate::error::RagError;
use crate::generate::{
    Generation, ScriptGenerator, TestPlanGenerator, SCRIPT_SENTINEL_PREFIX, TEST_PLAN_SENTINEL,
};
use crate::ingest::{ingest_files_with, IngestOutcome};
use crate::llm::{select_chat_model, ChatModel};
use crate::loader::ParserRegistry;
use crate::session::SessionId;
use crate::store::VectorStore;
use crate::sweep::sweep_stale_sessions;
use crate::uploads;

/// Header carrying the session id on `POST /api/ingest`.
pub const SESSION_HEADER: &str = "session-id";

const NO_HTML_MESSAGE: &str =
    "No HTML file found for this session. Please go to Tab 1 and upload your target HTML file.";

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: Arc<VectorStore>,
    parsers: Arc<ParserRegistry>,
    /// Fixed chat model; when `None` one is selected from `[llm]` per request.
    chat: Option<Arc<dyn ChatModel>>,
}

impl AppState {
    pub fn new(config: Arc<Config>, store: Arc<VectorStore>) -> Self {
        Self {
            config,
            store,
            parsers: Arc::new(ParserRegistry::with_builtins()),
            chat: None,
        }
    }

    /// Use `chat` for every generation instead of the configured providers.
    pub fn with_chat_model(mut self, chat: Arc<dyn ChatModel>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn with_parsers(mut self, parsers: Arc<ParserRegistry>) -> Self {
        self.parsers = parsers;
        self
    }

    fn chat_model(&self) -> Result<Arc<dyn ChatModel>, AppError> {
        match &self.chat {
            Some(chat) => Ok(chat.clone()),
            None => select_chat_model(&self.config.llm).map_err(AppError::from),
        }
    }
}

/// Starts the HTTP server.
///
/// Opens the vector store, sweeps stale sessions once, then binds to
/// `[server].bind` and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());
    let store = Arc::new(VectorStore::open(&config).await?);

    let report = sweep_stale_sessions(
        &config.storage.upload_dir,
        config.session.timeout(),
        SystemTime::now(),
        &store,
    )
    .await?;
    if !report.removed.is_empty() {
        println!("Removed {} stale session(s)", report.removed.len());
    }

    let app = build_router(AppState::new(config, store));

    println!("QA harness listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the `/api` router with CORS and upload limits applied.
pub fn build_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .server
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            // `AllowOrigin::list` rejects the wildcard; `load_config` does too.
            Ok(v) if v != "*" => Some(v),
            _ => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let api = Router::new()
        .route("/session/start", post(handle_start_session))
        .route("/session/{id}", delete(handle_delete_session))
        .route("/ingest", post(handle_ingest))
        .route("/generate-tests", post(handle_generate_tests))
        .route("/generate-script", post(handle_generate_script))
        .route("/health", get(handle_health));

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
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

fn generation_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "generation_failed".to_string(),
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

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::InvalidSession(_) => bad_request(err.to_string()),
            RagError::NotFound(msg) => not_found(msg),
            RagError::Generation(msg) => generation_failed(msg),
            RagError::Configuration(_) | RagError::Internal(_) => internal(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        internal(format!("{:#}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"operational"` when the server is running.
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "operational".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Sessions ============

#[derive(Serialize)]
struct StartSessionResponse {
    session_id: String,
}

async fn handle_start_session() -> Json<StartSessionResponse> {
    let session = SessionId::generate();
    tracing::info!(session = %session, "new session started");
    Json(StartSessionResponse {
        session_id: session.to_string(),
    })
}

#[derive(Serialize)]
struct DeleteSessionResponse {
    session_id: String,
    collection_deleted: bool,
    directory_deleted: bool,
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteSessionResponse>, AppError> {
    let session = SessionId::parse(&id)?;
    let collection_deleted = state
        .store
        .delete_collection(&session.collection_name())
        .await?;
    let directory_deleted =
        uploads::remove_session_dir(&state.config.storage.upload_dir, &session).await?;

    Ok(Json(DeleteSessionResponse {
        session_id: session.to_string(),
        collection_deleted,
        directory_deleted,
    }))
}

// ============ POST /api/ingest ============

async fn handle_ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<IngestOutcome>, AppError> {
    let raw_session = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_request("Session-ID header required"))?;
    let session = SessionId::parse(raw_session)?;

    let mut saved = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(e.body_text()))?;

        if uploads::sanitize_file_name(&file_name).is_none() {
            tracing::warn!(session = %session, file = %file_name, "skipping upload with unusable name");
            continue;
        }
        let path =
            uploads::save_upload(&state.config.storage.upload_dir, &session, &file_name, &bytes)
                .await?;
        // A repeated name overwrote the earlier part; index the file once.
        if !saved.contains(&path) {
            saved.push(path);
        }
    }

    let outcome = ingest_files_with(
        &state.store,
        &state.config,
        state.parsers.clone(),
        &session,
        saved,
    )
    .await;
    Ok(Json(outcome))
}

// ============ POST /api/generate-tests ============

#[derive(Deserialize)]
struct GenerateTestsRequest {
    query: String,
    session_id: String,
}

#[derive(Serialize)]
struct GenerateTestsResponse {
    result: String,
}

async fn handle_generate_tests(
    State(state): State<AppState>,
    payload: Result<Json<GenerateTestsRequest>, JsonRejection>,
) -> Result<Json<GenerateTestsResponse>, AppError> {
    let Json(req) = payload?;
    let session = SessionId::parse(&req.session_id)?;

    let generator = TestPlanGenerator::new(
        state.store.clone(),
        state.chat_model()?,
        state.config.retrieval.test_plan_k,
    );

    match generator.generate(&session, &req.query).await {
        Generation::Generated(result) => Ok(Json(GenerateTestsResponse { result })),
        Generation::Failed { .. } if state.config.generation.sentinel_errors => {
            Ok(Json(GenerateTestsResponse {
                result: TEST_PLAN_SENTINEL.to_string(),
            }))
        }
        Generation::Failed { reason } => Err(generation_failed(reason)),
    }
}

// ============ POST /api/generate-script ============

#[derive(Deserialize)]
struct GenerateScriptRequest {
    test_case: String,
    session_id: String,
}

#[derive(Serialize)]
struct GenerateScriptResponse {
    script: String,
}

async fn handle_generate_script(
    State(state): State<AppState>,
    payload: Result<Json<GenerateScriptRequest>, JsonRejection>,
) -> Result<Json<GenerateScriptResponse>, AppError> {
    let Json(req) = payload?;
    let session = SessionId::parse(&req.session_id)?;

    let html_path = uploads::find_html(&state.config.storage.upload_dir, &session)?
        .ok_or_else(|| {
            tracing::warn!(session = %session, "no HTML uploaded");
            not_found(NO_HTML_MESSAGE)
        })?;
    let html = tokio::fs::read_to_string(&html_path)
        .await
        .map_err(|e| internal(format!("reading {}: {}", html_path.display(), e)))?;
    tracing::info!(session = %session, html = %html_path.display(), "found HTML target");

    let generator = ScriptGenerator::new(
        state.store.clone(),
        state.chat_model()?,
        state.config.retrieval.script_k,
    );

    match generator.generate(&session, &req.test_case, &html).await {
        Generation::Generated(script) => Ok(Json(GenerateScriptResponse { script })),
        Generation::Failed { reason } if state.config.generation.sentinel_errors => {
            Ok(Json(GenerateScriptResponse {
                script: format!("{}{}", SCRIPT_SENTINEL_PREFIX, reason.replace('\n', " ")),
            }))
        }
        Generation::Failed { reason } => Err(generation_failed(reason)),
    }
}
