use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use docvault_rag::{
    ChatMessage, ErrorResponse, EventHandler, IngestResponse, PipelineHandler, RagError, SourceFile,
    response::UPLOAD_FAILED,
};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    config::ServerConfig,
    staging::{StagingArea, UploadBatch},
};

/// Message for search requests that fail for reasons other than bad input.
pub const SEARCH_FAILED: &str = "Search not successful :(";

#[derive(Clone, Debug)]
pub struct AppState {
    pub handler: PipelineHandler,
    pub staging: StagingArea,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(handler: PipelineHandler, staging: StagingArea) -> Self {
        Self { handler, staging, max_upload_bytes: ServerConfig::default().max_upload_bytes }
    }

    /// Build the pipeline singletons described by `config`.
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let pipeline = Arc::new(config.build_pipeline()?);
        let handler = PipelineHandler::new(pipeline, config.default_collection.clone());
        Ok(Self {
            handler,
            staging: StagingArea::new(&config.upload_dir),
            max_upload_bytes: config.max_upload_bytes,
        })
    }
}

#[derive(Debug, Deserialize)]
struct UploadOptions {
    collection: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: Option<String>,
    collection: Option<String>,
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .route("/", get(index))
        .route("/health", get(health).post(health))
        .route("/reset", get(reset).post(reset))
        .route("/upload", post(upload))
        .route("/search", post(search))
        .route("/message", post(message))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    state.staging.ensure().await?;
    info!(
        store = state.handler.pipeline().vector_store().name(),
        embedder = state.handler.pipeline().embedding_provider().name(),
        upload_dir = %state.staging.root().display(),
        "pipeline ready"
    );

    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docvault server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("docvault listening on http://{}", addr);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("docvault stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

async fn index() -> impl IntoResponse {
    "Hello World"
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = state.handler.health().await;
    let status = if response.is_healthy() { StatusCode::OK } else { StatusCode::NOT_FOUND };
    (status, Json(response))
}

async fn reset(State(state): State<AppState>) -> impl IntoResponse {
    let response = state.handler.reset().await;
    let status = if response.is_success() { StatusCode::OK } else { StatusCode::NOT_FOUND };
    (status, Json(response))
}

fn upload_rejected(error: impl Into<String>) -> (StatusCode, Json<IngestResponse>) {
    let error = RagError::Validation(error.into());
    (StatusCode::BAD_REQUEST, Json(IngestResponse::from(&error)))
}

/// Read the multipart body, staging every `file` part as it arrives.
async fn read_upload(
    multipart: &mut Multipart,
    batch: &mut UploadBatch,
) -> Result<(Option<String>, Vec<SourceFile>), (StatusCode, Json<IngestResponse>)> {
    let mut collection = None;
    let mut files = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(upload_rejected(format!("malformed multipart body: {e}"))),
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "json" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| upload_rejected(format!("unreadable 'json' field: {e}")))?;
                let options: UploadOptions = serde_json::from_str(&text)
                    .map_err(|e| upload_rejected(format!("invalid 'json' field: {e}")))?;
                collection = options.collection;
            }
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| upload_rejected(format!("unreadable file '{file_name}': {e}")))?;
                let file = batch.save(&file_name, bytes.to_vec()).await.map_err(|e| {
                    error!(file_name = %file_name, error = %e, "failed to stage upload");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(IngestResponse::Failure {
                            message: UPLOAD_FAILED.to_string(),
                            error: format!("{e:#}"),
                            partial: false,
                            collection_count: None,
                        }),
                    )
                })?;
                files.push(file);
            }
            other => warn!(field = other, "ignoring unknown multipart field"),
        }
    }

    Ok((collection, files))
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> impl IntoResponse {
    let mut batch = state.staging.batch();

    let (collection, files) = match read_upload(&mut multipart, &mut batch).await {
        Ok(parts) => parts,
        Err(rejection) => {
            batch.discard().await;
            return rejection;
        }
    };
    let Some(collection) = collection.filter(|c| !c.trim().is_empty()) else {
        batch.discard().await;
        return upload_rejected("'collection' is required in the 'json' field");
    };
    if files.is_empty() {
        batch.discard().await;
        return upload_rejected("at least one 'file' part is required");
    }

    let response = state.handler.on_upload(&collection, files).await;
    if !response.is_success() {
        batch.discard().await;
        return (StatusCode::NOT_FOUND, Json(response));
    }
    match batch.finish().await {
        Ok(()) => (StatusCode::OK, Json(response)),
        Err(e) => {
            error!(collection = %collection, error = %format!("{e:#}"), "indexed upload but staging cleanup failed");
            (StatusCode::NOT_FOUND, Json(cleanup_failed(response, &e)))
        }
    }
}

/// Turn an indexed upload whose staging directory could not be removed into a
/// partial failure that still reports the collection count.
fn cleanup_failed(response: IngestResponse, e: &anyhow::Error) -> IngestResponse {
    let collection_count = match response {
        IngestResponse::Success { collection_count, .. } => Some(collection_count),
        IngestResponse::Failure { collection_count, .. } => collection_count,
    };
    IngestResponse::Failure {
        message: UPLOAD_FAILED.to_string(),
        error: format!("{e:#}"),
        partial: true,
        collection_count,
    }
}

fn error_status(e: &RagError) -> StatusCode {
    if e.is_validation() { StatusCode::BAD_REQUEST } else { StatusCode::INTERNAL_SERVER_ERROR }
}

/// Map an unparseable JSON body to the same error shape as every other failure.
fn body_rejected(rejection: JsonRejection) -> (StatusCode, Json<ErrorResponse>) {
    warn!(error = %rejection.body_text(), "rejected request body");
    let error = RagError::Validation(rejection.body_text());
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { message: SEARCH_FAILED.to_string(), error: error.to_string() }),
    )
}

async fn search(
    State(state): State<AppState>,
    request: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let Json(request) = request.map_err(body_rejected)?;
    let query = request.query.unwrap_or_default();
    let collection = request.collection.unwrap_or_default();

    state.handler.on_query(&collection, &query).await.map(Json).map_err(|e| {
        error!(collection = %collection, error = %e, "search failed");
        (error_status(&e), Json(ErrorResponse { message: SEARCH_FAILED.to_string(), error: e.to_string() }))
    })
}

async fn message(
    State(state): State<AppState>,
    request: Result<Json<ChatMessage>, JsonRejection>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let Json(request) = request.map_err(body_rejected)?;
    state.handler.on_message(request).await.map(Json).map_err(|e| {
        error!(error = %e, "chat message failed");
        (error_status(&e), Json(ErrorResponse { message: SEARCH_FAILED.to_string(), error: e.to_string() }))
    })
}
