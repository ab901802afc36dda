//! Dashboard presentation policy
//!
//! Maps a condition state onto UI hints for the dashboard (card count,
//! alert strength, tone). Pure mapping, served alongside the snapshot
//! so the dashboard never needs its own interpretation rules.

use condition_engine::ConditionState;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewPolicy {
    pub ui_mode: &'static str,
    pub max_cards: u8,
    pub alert_strength: &'static str,
    pub tone: &'static str,
}

impl ViewPolicy {
    pub fn for_state(state: ConditionState) -> Self {
        match state {
            ConditionState::Tired => Self {
                ui_mode: "compact",
                max_cards: 2,
                alert_strength: "low",
                tone: "short",
            },
            ConditionState::Tense => Self {
                ui_mode: "calm",
                max_cards: 3,
                alert_strength: "mid",
                tone: "reassuring",
            },
            ConditionState::NoResponse => Self {
                ui_mode: "prompt",
                max_cards: 2,
                alert_strength: "mid",
                tone: "call",
            },
            ConditionState::NoFace => Self {
                ui_mode: "idle",
                max_cards: 1,
                alert_strength: "low",
                tone: "idle",
            },
            ConditionState::Neutral => Self {
                ui_mode: "default",
                max_cards: 4,
                alert_strength: "mid",
                tone: "normal",
            },
        }
    }
}
