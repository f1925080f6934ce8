//! Read-only access to delivery records.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/deliveries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ListDeliveriesQuery {
    #[serde(default)]
    pub entry_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    100
}

pub async fn list_deliveries(
    State(state): State<AppState>,
    Query(q): Query<ListDeliveriesQuery>,
) -> impl IntoResponse {
    let records = match q.entry_id {
        Some(id) => state.store.records_for(&id),
        None => state.store.list_delivery_records(),
    };
    let total = records.len();
    let limit = q.limit.min(1000);
    // Most recent first.
    let page: Vec<_> = records.into_iter().rev().skip(q.offset).take(limit).collect();
    Json(serde_json::json!({
        "deliveries": page,
        "total": total,
        "limit": limit,
        "offset": q.offset,
    }))
}
