//! HTTP surface: multipart upload, SSE notifications, and health.

use crate::hub::{Notification, SubscriberHub};
use crate::queue::ProcessingQueue;
use crate::store::UploadStore;
use crate::types::FileHandle;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Multipart field that carries uploaded files.
pub const UPLOAD_FIELD: &str = "midiFiles";

const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub queue: ProcessingQueue,
    pub hub: SubscriberHub,
    pub store: Arc<UploadStore>,
    pub max_files: usize,
    pub started_at: Instant,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/upload", post(upload))
        .route("/api/events", get(events))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

struct Incoming {
    name: String,
    bytes: Vec<u8>,
}

/// Accept up to `max_files` MIDI files and queue them as one batch.
///
/// Every file is validated before anything is written, so a rejected
/// request leaves nothing queued.
#[tracing::instrument(name = "http.upload", skip_all, fields(upload.files = tracing::field::Empty))]
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut incoming = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(e.status(), e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            tracing::debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }

        if incoming.len() == state.max_files {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("too many files, at most {} per upload", state.max_files),
            ));
        }

        let name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "file part has no filename"))?;

        state
            .store
            .validate(&name, field.content_type())
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| api_error(e.status(), e.body_text()))?;

        incoming.push(Incoming {
            name,
            bytes: bytes.to_vec(),
        });
    }

    if incoming.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("no files uploaded under field {UPLOAD_FIELD}"),
        ));
    }

    let mut handles: Vec<FileHandle> = Vec::with_capacity(incoming.len());
    for file in &incoming {
        let handle = state
            .store
            .store(&file.name, UPLOAD_FIELD, &file.bytes)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to store upload");
                api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            })?;
        handles.push(handle);
    }

    let names: Vec<String> = handles.iter().map(|h| h.name.clone()).collect();
    tracing::Span::current().record("upload.files", names.len());

    state.queue.enqueue_batch(handles);

    Ok(Json(json!({
        "message": "Files are being processed",
        "files": names,
    })))
}

/// Stream notifications as Server-Sent Events until the client goes away.
async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut subscription = state.hub.subscribe("sse");

    let stream = async_stream::stream! {
        while let Some(notification) = subscription.recv().await {
            yield Ok(to_sse_event(&notification));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE).text("ping"))
}

fn to_sse_event(notification: &Notification) -> Event {
    Event::default()
        .event(notification.event.as_str())
        .data(notification.payload.to_string())
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "queue": state.queue.stats(),
        "subscribers": state.hub.subscriber_count(),
    }))
}
