//! Shared-state publisher
//!
//! Two independently guarded slots (latest snapshot, latest raw frame)
//! plus the interaction marker. The capture loop overwrites the slots
//! wholesale each tick; any number of readers copy out concurrently.
//! Locks are scoped to the swap/copy only, so slow readers can delay a
//! single swap but never a frame read or feature extraction.

use crate::classifier::ConditionState;
use crate::window::DerivedMetrics;
use frame_source::frame::now_ms;
use frame_source::VideoFrame;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LockResult, Mutex, MutexGuard};

/// Immutable classification result, superseded wholesale each tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSnapshot {
    pub state: ConditionState,
    pub face_detected: bool,
    pub blink_per_min: f32,
    pub closed_ratio_10s: f32,
    pub head_motion_std: f32,
    /// Publish timestamp (epoch milliseconds)
    pub last_update_ts: u64,
}

impl ConditionSnapshot {
    /// Safe degraded snapshot: no face, closed ratio saturated
    pub fn absent(last_update_ts: u64) -> Self {
        Self {
            state: ConditionState::NoFace,
            face_detected: false,
            blink_per_min: 0.0,
            closed_ratio_10s: 1.0,
            head_motion_std: 0.0,
            last_update_ts,
        }
    }

    pub fn from_metrics(state: ConditionState, metrics: &DerivedMetrics, ts: u64) -> Self {
        Self {
            state,
            face_detected: metrics.face_detected,
            blink_per_min: round_to(metrics.blink_per_min, 2),
            closed_ratio_10s: round_to(metrics.closed_ratio_10s, 3),
            head_motion_std: round_to(metrics.head_motion_std, 2),
            last_update_ts: ts,
        }
    }
}

fn round_to(value: f32, digits: i32) -> f32 {
    let factor = 10f32.powi(digits);
    (value * factor).round() / factor
}

/// Concurrency-safe holder for the latest snapshot and frame
pub struct SharedCondition {
    snapshot: Mutex<ConditionSnapshot>,
    frame: Mutex<Option<VideoFrame>>,
    /// Last externally signaled user interaction (epoch ms)
    last_interaction_ms: AtomicU64,
}

impl SharedCondition {
    /// Before the first tick readers see a default `noface` snapshot;
    /// the interaction marker is seeded to "now" so a freshly started
    /// process does not classify as unresponsive immediately.
    pub fn new() -> Self {
        Self {
            snapshot: Mutex::new(ConditionSnapshot::absent(0)),
            frame: Mutex::new(None),
            last_interaction_ms: AtomicU64::new(now_ms()),
        }
    }

    /// Replace the published snapshot. Writer is the capture loop only,
    /// so reader-visible timestamps are monotonically non-decreasing.
    pub fn publish_snapshot(&self, snapshot: ConditionSnapshot) {
        *recover(self.snapshot.lock()) = snapshot;
    }

    /// Most recent complete snapshot (copy-out, non-blocking beyond the
    /// swap-scoped lock)
    pub fn get_snapshot(&self) -> ConditionSnapshot {
        recover(self.snapshot.lock()).clone()
    }

    /// Replace the published raw frame for re-broadcast
    pub fn publish_frame(&self, frame: VideoFrame) {
        *recover(self.frame.lock()) = Some(frame);
    }

    /// Most recent raw frame, if any tick has published one
    pub fn get_latest_frame(&self) -> Option<VideoFrame> {
        recover(self.frame.lock()).clone()
    }

    /// Record an external user interaction. Callable from any thread.
    pub fn mark_interaction(&self, timestamp_ms: u64) {
        self.last_interaction_ms.store(timestamp_ms, Ordering::Relaxed);
    }

    pub fn last_interaction_ms(&self) -> u64 {
        self.last_interaction_ms.load(Ordering::Relaxed)
    }

    /// Seconds elapsed since the last recorded interaction
    pub fn secs_since_interaction(&self, now_ms: u64) -> f32 {
        now_ms.saturating_sub(self.last_interaction_ms()) as f32 / 1000.0
    }
}

impl Default for SharedCondition {
    fn default() -> Self {
        Self::new()
    }
}

/// Readers must always get a well-formed value; a panicked writer left
/// the slot with its last complete content, which is still safe to serve.
fn recover<'a, T>(result: LockResult<MutexGuard<'a, T>>) -> MutexGuard<'a, T> {
    result.unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_before_first_tick() {
        let shared = SharedCondition::new();
        let snapshot = shared.get_snapshot();
        assert_eq!(snapshot.state, ConditionState::NoFace);
        assert!(!snapshot.face_detected);
        assert_eq!(snapshot.closed_ratio_10s, 1.0);
        assert_eq!(snapshot.last_update_ts, 0);
        assert!(shared.get_latest_frame().is_none());
    }

    #[test]
    fn test_snapshot_replaced_wholesale() {
        let shared = SharedCondition::new();
        let metrics = DerivedMetrics {
            blink_per_min: 12.345,
            closed_ratio_10s: 0.1234,
            head_motion_std: 3.456,
            face_detected: true,
        };
        shared.publish_snapshot(ConditionSnapshot::from_metrics(
            ConditionState::Neutral,
            &metrics,
            1000,
        ));

        let snapshot = shared.get_snapshot();
        assert_eq!(snapshot.state, ConditionState::Neutral);
        assert_eq!(snapshot.blink_per_min, 12.35);
        assert_eq!(snapshot.closed_ratio_10s, 0.123);
        assert_eq!(snapshot.head_motion_std, 3.46);
        assert_eq!(snapshot.last_update_ts, 1000);
    }

    #[test]
    fn test_readers_copy_out() {
        let shared = SharedCondition::new();
        shared.publish_snapshot(ConditionSnapshot::absent(500));
        let copy = shared.get_snapshot();
        shared.publish_snapshot(ConditionSnapshot::absent(900));
        // The earlier copy is unaffected by the later publish
        assert_eq!(copy.last_update_ts, 500);
        assert_eq!(shared.get_snapshot().last_update_ts, 900);
    }

    #[test]
    fn test_latest_frame_overwritten() {
        let shared = SharedCondition::new();
        shared.publish_frame(VideoFrame::new(vec![0; 12], 2, 2, 100, 0));
        shared.publish_frame(VideoFrame::new(vec![0; 12], 2, 2, 200, 1));
        let frame = shared.get_latest_frame().unwrap();
        assert_eq!(frame.sequence, 1);
    }

    #[test]
    fn test_interaction_marker() {
        let shared = SharedCondition::new();
        shared.mark_interaction(10_000);
        assert_eq!(shared.last_interaction_ms(), 10_000);
        assert!((shared.secs_since_interaction(25_000) - 15.0).abs() < 1e-6);
        // Clock skew never yields a negative interval
        assert_eq!(shared.secs_since_interaction(5_000), 0.0);
    }
}
