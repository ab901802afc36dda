//! Self-adapting personal baseline

use crate::window::DerivedMetrics;
use serde::{Deserialize, Serialize};

/// Default smoothing factor for both running estimates
pub const DEFAULT_ALPHA: f32 = 0.02;

/// Exponentially-weighted estimate of this subject's "normal" eye
/// closure and head motion. Process-lifetime state; the capture loop
/// updates it only on ticks classified as neutral, so abnormal periods
/// never drag the reference toward themselves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Running estimate of normal closed-eye ratio
    pub closed_ema: f32,
    /// Running estimate of normal head motion
    pub motion_ema: f32,
}

impl Default for Baseline {
    /// Plausible population defaults, used until enough neutral
    /// observations accumulate.
    fn default() -> Self {
        Self {
            closed_ema: 0.25,
            motion_ema: 6.0,
        }
    }
}

impl Baseline {
    /// Fold this tick's metrics into the running estimates.
    ///
    /// No-op when the face is not detected: an absent subject's
    /// saturated closed ratio must never contaminate the baseline.
    pub fn update(&mut self, metrics: &DerivedMetrics, alpha: f32) {
        if !metrics.face_detected {
            return;
        }
        self.closed_ema = (1.0 - alpha) * self.closed_ema + alpha * metrics.closed_ratio_10s;
        self.motion_ema = (1.0 - alpha) * self.motion_ema + alpha * metrics.head_motion_std;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(closed: f32, motion: f32) -> DerivedMetrics {
        DerivedMetrics {
            blink_per_min: 0.0,
            closed_ratio_10s: closed,
            head_motion_std: motion,
            face_detected: true,
        }
    }

    #[test]
    fn test_defaults() {
        let baseline = Baseline::default();
        assert_eq!(baseline.closed_ema, 0.25);
        assert_eq!(baseline.motion_ema, 6.0);
    }

    #[test]
    fn test_ema_step() {
        let mut baseline = Baseline::default();
        baseline.update(&metrics(0.5, 10.0), 0.02);
        assert!((baseline.closed_ema - (0.98 * 0.25 + 0.02 * 0.5)).abs() < 1e-6);
        assert!((baseline.motion_ema - (0.98 * 6.0 + 0.02 * 10.0)).abs() < 1e-6);
    }

    #[test]
    fn test_no_adaptation_without_face() {
        let mut baseline = Baseline::default();
        let before = baseline;
        baseline.update(&DerivedMetrics::absent(), 0.02);
        assert_eq!(baseline, before);
    }

    #[test]
    fn test_converges_toward_observations() {
        let mut baseline = Baseline::default();
        for _ in 0..500 {
            baseline.update(&metrics(0.4, 12.0), 0.02);
        }
        assert!((baseline.closed_ema - 0.4).abs() < 0.01);
        assert!((baseline.motion_ema - 12.0).abs() < 0.1);
    }
}
