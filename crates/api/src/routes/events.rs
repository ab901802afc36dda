//! State-change event routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use event_log::EventRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::AppState;

/// Query parameters for the events endpoint
#[derive(Debug, Deserialize)]
pub struct EventQuery {
    /// Maximum number of records to return
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for the events endpoint
#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub data: Vec<EventRecord>,
    pub meta: EventMeta,
}

#[derive(Debug, Serialize)]
pub struct EventMeta {
    pub count: usize,
    pub limit: usize,
}

/// Recent state-change events, newest first
pub async fn get_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventQuery>,
) -> Result<Json<EventResponse>, StatusCode> {
    let limit = params.limit.min(1000);

    let data = state.events.recent(limit).map_err(|e| {
        warn!("Event log read failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(EventResponse {
        meta: EventMeta {
            count: data.len(),
            limit,
        },
        data,
    }))
}
