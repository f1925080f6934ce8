pub mod deliveries;
pub mod entries;
pub mod health;
pub mod scheduler;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Health
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/v1/health", get(health::health))
        // Entries
        .route("/v1/entries", get(entries::list_entries).post(entries::create_entry))
        .route("/v1/entries/import", post(entries::import_entries))
        .route("/v1/entries/quarantine", get(entries::list_quarantined))
        .route("/v1/entries/events", get(entries::entry_events_sse))
        .route(
            "/v1/entries/:id",
            get(entries::get_entry).delete(entries::delete_entry),
        )
        // Delivery records (read-only)
        .route("/v1/deliveries", get(deliveries::list_deliveries))
        // Scheduler
        .route("/v1/scheduler/status", get(scheduler::status))
        .route("/v1/scheduler/run", post(scheduler::run_now))
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
