//! Entry CRUD, bulk import, quarantine listing and SSE events.

use std::path::PathBuf;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures_util::stream::Stream;
use serde::Deserialize;
use uuid::Uuid;

use crate::import::{import_file, preview_file, ImportError};
use crate::runtime::entries::{validate, EntryEvent, NewEntry};
use crate::state::AppState;

use super::api_error;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/entries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_entries(State(state): State<AppState>) -> impl IntoResponse {
    let entries = state.store.list();
    let count = entries.len();
    Json(serde_json::json!({
        "entries": entries,
        "count": count,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/entries/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_entry(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.store.get(&id) {
        Ok(entry) => Json(serde_json::json!({ "entry": entry })).into_response(),
        Err(e) => api_error(StatusCode::NOT_FOUND, e.to_string()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/entries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn create_entry(
    State(state): State<AppState>,
    body: Result<Json<NewEntry>, JsonRejection>,
) -> Response {
    let Json(input) = match body {
        Ok(b) => b,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let validated = match validate(&input) {
        Ok(v) => v,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let entry = state.store.create(validated);
    tracing::info!(entry_id = %entry.id, recipient = %entry.recipient, "entry created");
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "entry": entry })),
    )
        .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /v1/entries/:id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn delete_entry(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.store.delete(&id) {
        Ok(_) => {
            tracing::info!(entry_id = %id, "entry deleted");
            Json(serde_json::json!({ "deleted": id })).into_response()
        }
        Err(e) => api_error(StatusCode::NOT_FOUND, e.to_string()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/entries/import
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub path: PathBuf,
    /// Validate and report without storing anything.
    #[serde(default)]
    pub dry_run: bool,
}

fn import_error(e: ImportError) -> Response {
    match e {
        ImportError::NotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        other => api_error(StatusCode::BAD_REQUEST, other.to_string()),
    }
}

pub async fn import_entries(
    State(state): State<AppState>,
    body: Result<Json<ImportRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.body_text()),
    };

    let store = state.store.clone();
    let joined = tokio::task::spawn_blocking(move || {
        if req.dry_run {
            preview_file(&req.path).map(|r| serde_json::json!({ "dry_run": true, "report": r }))
        } else {
            import_file(&store, &req.path).map(|s| serde_json::json!(s))
        }
    })
    .await;

    match joined {
        Ok(Ok(body)) => Json(body).into_response(),
        Ok(Err(e)) => import_error(e),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("import task failed: {e}")),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/entries/quarantine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_quarantined(State(state): State<AppState>) -> impl IntoResponse {
    let threshold = state.config.scheduler.clamped().quarantine_after;
    let rows = state.store.quarantined(threshold);
    let count = rows.len();
    Json(serde_json::json!({
        "quarantined": rows,
        "count": count,
        "threshold": threshold,
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/entries/events (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn entry_events_sse(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let mut rx = state.store.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let event_type = match &event {
                        EntryEvent::EntryCreated { .. } => "entry.created",
                        EntryEvent::EntryDeleted { .. } => "entry.deleted",
                        EntryEvent::EntryDispatched { .. } => "entry.dispatched",
                    };
                    if let Ok(json) = serde_json::to_string(&event) {
                        yield Ok(Event::default().event(event_type).data(json));
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    };

    Sse::new(stream)
}
