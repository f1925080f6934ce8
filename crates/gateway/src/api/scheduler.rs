//! Scheduler status and manual trigger.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/scheduler/status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "scheduler": state.scheduler.status(),
        "pending_entries": state.store.len(),
        "in_flight": state.store.in_flight_count(),
        "deliveries": state.store.delivery_count(),
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/scheduler/run
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn run_now(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.scheduler.run_now().await;
    tracing::info!(
        dispatched = report.dispatched,
        failed = report.failed,
        "manual poll cycle complete"
    );
    Json(serde_json::json!({ "report": report }))
}
