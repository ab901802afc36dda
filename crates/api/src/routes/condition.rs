//! Condition snapshot route

use axum::{extract::State, Json};
use condition_engine::ConditionSnapshot;
use serde::Serialize;
use std::sync::Arc;

use crate::policy::ViewPolicy;
use crate::AppState;

/// Response for the condition endpoint
#[derive(Debug, Serialize)]
pub struct ConditionResponse {
    pub cond: ConditionSnapshot,
    pub policy: ViewPolicy,
}

/// Latest classification plus the matching dashboard policy.
/// Always well-formed: before the first tick this serves the default
/// `noface` snapshot.
pub async fn get_condition(State(state): State<Arc<AppState>>) -> Json<ConditionResponse> {
    let cond = state.shared.get_snapshot();
    let policy = ViewPolicy::for_state(cond.state);
    Json(ConditionResponse { cond, policy })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Dashboard clients key on these exact field names and the
    // lowercase state spelling.
    #[test]
    fn test_response_wire_shape() {
        let cond = ConditionSnapshot::absent(1_000);
        let policy = ViewPolicy::for_state(cond.state);
        let value = serde_json::to_value(ConditionResponse { cond, policy }).unwrap();

        assert_eq!(value["cond"]["state"], "noface");
        assert_eq!(value["cond"]["face_detected"], false);
        assert_eq!(value["cond"]["closed_ratio_10s"], 1.0);
        assert_eq!(value["cond"]["last_update_ts"], 1_000);
        assert_eq!(value["policy"]["ui_mode"], "idle");
        assert_eq!(value["policy"]["max_cards"], 1);
    }
}
