//! HTTP surface for docket.
//!
//! A thin Axum router over [`DocumentApi`]:
//!
//! - `POST /upload_files?collection_name=<name>` – multipart upload (`files` parts); creates the
//!   collection, summarizes and indexes every document. Returns `{ "status": "<message>" }`.
//! - `POST /search` – `{ "query", "collection_name" }`; returns the matched passages as a string.
//! - `POST /ask_question` – `{ "question", "collection_name" }`; returns the answer as a string.
//! - `GET /collections` – Human-readable listing of registered collections.
//! - `GET /metrics` – Ingestion and retrieval counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Pipeline failures are reported inside the string payload with status 200; only malformed
//! requests are rejected by the extractors.

use crate::metrics::MetricsSnapshot;
use crate::processing::{DocumentApi, UploadedFile};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State, multipart::MultipartError},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the HTTP router exposing the document API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: DocumentApi + 'static,
{
    Router::new()
        .route("/upload_files", post(upload_files::<S>))
        .route("/search", post(search::<S>))
        .route("/ask_question", post(ask_question::<S>))
        .route("/collections", get(list_collections::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

/// Query string for `POST /upload_files`.
#[derive(Deserialize)]
struct UploadParams {
    #[serde(default)]
    collection_name: String,
}

/// Response body for `POST /upload_files`.
#[derive(Serialize)]
struct UploadResponse {
    status: String,
}

/// Collect every `files` part and hand the documents to the ingestion pipeline.
async fn upload_files<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, MultipartError>
where
    S: DocumentApi,
{
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }
        let name = field
            .file_name()
            .map(base_name)
            .unwrap_or("upload.pdf")
            .to_string();
        let bytes = field.bytes().await?;
        files.push(UploadedFile::new(name, bytes.to_vec()));
    }

    tracing::info!(
        collection = %params.collection_name,
        files = files.len(),
        "Upload request received"
    );
    let status = service.upload_files(files, &params.collection_name).await;
    Ok(Json(UploadResponse { status }))
}

/// Strip any client-side directory components from an uploaded file name.
fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Request body for `POST /search`.
#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    collection_name: String,
}

async fn search<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SearchRequest>,
) -> Json<String>
where
    S: DocumentApi,
{
    Json(service.search(&request.query, &request.collection_name).await)
}

/// Request body for `POST /ask_question`.
#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    collection_name: String,
}

async fn ask_question<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<AskRequest>,
) -> Json<String>
where
    S: DocumentApi,
{
    Json(
        service
            .ask_question(&request.question, &request.collection_name)
            .await,
    )
}

async fn list_collections<S>(State(service): State<Arc<S>>) -> Json<String>
where
    S: DocumentApi,
{
    Json(service.list_collections().await)
}

/// Return the pipeline counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: DocumentApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload_files",
                method: "POST",
                path: "/upload_files?collection_name=<name>",
                description: "Upload PDFs as multipart `files` parts into a new collection. Each document is summarized and the summaries are indexed. Returns { \"status\": string }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "search",
                method: "POST",
                path: "/search",
                description: "Return the two stored summary passages closest to the query, separated by a blank line.",
                request_example: Some(json!({
                    "query": "termination clause",
                    "collection_name": "contracts"
                })),
            },
            CommandDescriptor {
                name: "ask_question",
                method: "POST",
                path: "/ask_question",
                description: "Answer a question using passages retrieved from the collection as context.",
                request_example: Some(json!({
                    "question": "Who may terminate the lease?",
                    "collection_name": "contracts"
                })),
            },
            CommandDescriptor {
                name: "list_collections",
                method: "GET",
                path: "/collections",
                description: "List registered collections and the files ingested into each.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return ingestion and retrieval counters.",
                request_example: None,
            },
        ],
    })
}
