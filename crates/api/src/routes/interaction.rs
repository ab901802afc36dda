//! Interaction marker route

use axum::{extract::State, Json};
use frame_source::frame::now_ms;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct InteractionResponse {
    pub ok: bool,
    pub interaction_ts: u64,
}

/// Record that the user just interacted with the UI. Pushes the
/// unresponsiveness timer back; callable from any client at any time.
pub async fn post_interaction(State(state): State<Arc<AppState>>) -> Json<InteractionResponse> {
    let now = now_ms();
    state.shared.mark_interaction(now);
    debug!("Interaction marked at {}", now);
    Json(InteractionResponse {
        ok: true,
        interaction_ts: now,
    })
}
