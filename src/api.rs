//! HTTP surface for ragdex.
//!
//! - `POST /ingest?name=<blob name>&url=<blob url>` – Run the ingestion pipeline over the raw
//!   request body and return the per-chunk run report. A missing or blank `name` yields a skipped
//!   report. Fatal errors answer `500` so the caller can redeliver.
//! - `POST /chat` – Accepts `{ "query": "..." }` and streams the grounded answer as server-sent
//!   events. Bad JSON or a blank query answer `400`; backend failures before the first fragment
//!   answer `500`; failures mid-answer end the stream with an `error` event.
//! - `GET /metrics` – Ingestion counters.
//! - `GET /commands` – Machine-readable command catalog for discovery by tools.

use crate::chat::{APOLOGY, AnswerEvent, ChatError};
use crate::metrics::MetricsSnapshot;
use crate::processing::{IngestError, IngestReport, SourceDocument};
use crate::service::RagApi;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;

const MAX_DOCUMENT_BYTES: usize = 100 * 1024 * 1024;

/// Build the HTTP router exposing ingestion and chat.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route(
            "/ingest",
            post(ingest_document::<S>).layer(DefaultBodyLimit::max(MAX_DOCUMENT_BYTES)),
        )
        .route("/chat", post(chat::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Query parameters of `POST /ingest`.
#[derive(Deserialize)]
struct IngestParams {
    /// Blob name, e.g. `docs/manual.pdf`.
    #[serde(default)]
    name: Option<String>,
    /// Retrieval URL stored with every chunk.
    #[serde(default)]
    url: Option<String>,
}

/// Ingest the raw request body as one document.
async fn ingest_document<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<IngestParams>,
    body: Bytes,
) -> Result<Json<IngestReport>, AppError>
where
    S: RagApi,
{
    let document = SourceDocument {
        name: params.name,
        url: params.url.unwrap_or_default(),
        content: body.to_vec(),
    };
    let report = service.ingest(document).await?;
    tracing::info!(
        blob = report.document.as_deref().unwrap_or_default(),
        skipped = report.skipped,
        indexed = report.indexed_count(),
        failed = report.failed_count(),
        "Ingest request completed"
    );
    Ok(Json(report))
}

/// Request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    query: Option<String>,
}

/// Stream a grounded answer as server-sent events.
async fn chat<S>(State(service): State<Arc<S>>, body: Bytes) -> Response
where
    S: RagApi,
{
    let Ok(request) = serde_json::from_slice::<ChatRequest>(&body) else {
        return (StatusCode::BAD_REQUEST, "Please provide a JSON body").into_response();
    };
    let query = request.query.unwrap_or_default();

    match service.answer(&query).await {
        Ok(answer) => {
            let events = answer.into_stream().map(|event| {
                Ok::<_, Infallible>(match event {
                    AnswerEvent::Fragment(text) => Event::default().data(text),
                    AnswerEvent::Failed(message) => Event::default().event("error").data(message),
                })
            });
            Sse::new(events)
                .keep_alive(KeepAlive::default())
                .into_response()
        }
        Err(ChatError::EmptyQuery) => {
            (StatusCode::BAD_REQUEST, ChatError::EmptyQuery.to_string()).into_response()
        }
        Err(error) => {
            tracing::error!(error = %error, "Chat request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, APOLOGY).into_response()
        }
    }
}

/// Return the ingestion counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: RagApi,
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

/// Enumerate supported HTTP commands for discovery.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "ingest",
                method: "POST",
                path: "/ingest?name=<blob name>&url=<blob url>",
                description: "Extract, chunk, embed and index the raw document sent as the request body. Returns the per-chunk run report.",
                request_example: None,
            },
            CommandDescriptor {
                name: "chat",
                method: "POST",
                path: "/chat",
                description: "Answer a question from indexed documents, streamed as server-sent events.",
                request_example: Some(json!({ "query": "How many vacation days do employees get?" })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return ingestion counters for documents and chunks.",
                request_example: None,
            },
        ],
    })
}

struct AppError(IngestError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(inner: IngestError) -> Self {
        Self(inner)
    }
}
