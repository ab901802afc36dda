//! Ordered threshold classifier

use crate::baseline::Baseline;
use crate::engine::EngineConfig;
use crate::window::DerivedMetrics;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete behavioral state labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionState {
    Tired,
    Tense,
    Neutral,
    NoFace,
    NoResponse,
}

impl ConditionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionState::Tired => "tired",
            ConditionState::Tense => "tense",
            ConditionState::Neutral => "neutral",
            ConditionState::NoFace => "noface",
            ConditionState::NoResponse => "noresponse",
        }
    }
}

impl fmt::Display for ConditionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map derived metrics onto a state label.
///
/// Rules are evaluated in strict priority order, first match wins:
/// an absent face is the least ambiguous signal and short-circuits
/// everything; unresponsiveness pairs a long interaction silence with
/// abnormally low motion, separating "asleep/away" from legitimately
/// still engagement; closed-eye evidence outranks motion jitter.
pub fn classify(
    metrics: &DerivedMetrics,
    secs_since_interaction: f32,
    baseline: &Baseline,
    config: &EngineConfig,
) -> ConditionState {
    if !metrics.face_detected {
        return ConditionState::NoFace;
    }

    if secs_since_interaction > config.noresponse_after_secs
        && metrics.head_motion_std < config.low_motion_factor * baseline.motion_ema
    {
        return ConditionState::NoResponse;
    }

    if metrics.closed_ratio_10s > baseline.closed_ema + config.closed_margin {
        return ConditionState::Tired;
    }

    if metrics.head_motion_std > baseline.motion_ema + config.motion_margin {
        return ConditionState::Tense;
    }

    ConditionState::Neutral
}
