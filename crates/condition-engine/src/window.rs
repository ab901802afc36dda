//! Rolling sample window and derived statistics

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Trailing span covered by the window (milliseconds)
pub const WINDOW_SPAN_MS: u64 = 10_000;

/// Minimum face-presence ratio for the window to count as "face detected"
pub const MIN_FACE_RATIO: f32 = 0.30;

/// One per-frame observation. Immutable once created; produced once per
/// tick and owned by the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Observation timestamp (epoch milliseconds)
    pub timestamp_ms: u64,
    /// Face region found in the frame
    pub face_found: bool,
    /// Eye region found within the face
    pub eyes_found: bool,
    /// Face center in pixels, if a face was found
    pub center: Option<(f32, f32)>,
}

impl Sample {
    /// Empty observation: failed acquisition or an unusable frame
    pub fn absent(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            face_found: false,
            eyes_found: false,
            center: None,
        }
    }
}

/// Statistics derived wholly from the current window contents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Eye-reappearance transitions scaled to a per-minute rate
    pub blink_per_min: f32,
    /// Fraction of face-present samples with no eye region (0..=1)
    pub closed_ratio_10s: f32,
    /// sqrt(var(x) + var(y)) over face centers
    pub head_motion_std: f32,
    /// Face-presence ratio reached the detection threshold
    pub face_detected: bool,
}

impl DerivedMetrics {
    /// Conservative no-face result: closed ratio saturates at 1.0 so an
    /// absent subject reads as "fully closed", never as alert.
    pub fn absent() -> Self {
        Self {
            blink_per_min: 0.0,
            closed_ratio_10s: 1.0,
            head_motion_std: 0.0,
            face_detected: false,
        }
    }
}

/// Time-bounded buffer of recent samples.
///
/// Append-only at the tail, eviction only from the head; mutated only by
/// the capture-loop thread. Every retained sample is within `span_ms` of
/// the most recently appended sample.
#[derive(Debug)]
pub struct SampleWindow {
    samples: VecDeque<Sample>,
    span_ms: u64,
    min_face_ratio: f32,
}

impl SampleWindow {
    pub fn new(span_ms: u64, min_face_ratio: f32) -> Self {
        Self {
            samples: VecDeque::with_capacity(256),
            span_ms,
            min_face_ratio,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Append at the tail; evict head entries older than the span
    /// relative to the new sample's timestamp.
    pub fn append(&mut self, sample: Sample) {
        let cutoff = sample.timestamp_ms.saturating_sub(self.span_ms);
        self.samples.push_back(sample);
        while self
            .samples
            .front()
            .is_some_and(|s| s.timestamp_ms < cutoff)
        {
            self.samples.pop_front();
        }
    }

    /// Recompute all derived statistics from the current contents.
    /// Idempotent for fixed contents.
    pub fn compute(&self) -> DerivedMetrics {
        if self.samples.is_empty() {
            return DerivedMetrics::absent();
        }

        let face_count = self.samples.iter().filter(|s| s.face_found).count();
        let face_ratio = face_count as f32 / self.samples.len() as f32;
        if face_ratio < self.min_face_ratio {
            return DerivedMetrics::absent();
        }

        // All remaining statistics are restricted to face-present samples.
        let face_samples: Vec<&Sample> =
            self.samples.iter().filter(|s| s.face_found).collect();
        if face_samples.is_empty() {
            return DerivedMetrics::absent();
        }

        let eyes_missing = face_samples.iter().filter(|s| !s.eyes_found).count();
        let closed_ratio = eyes_missing as f32 / face_samples.len() as f32;

        let xs: Vec<f32> = face_samples.iter().filter_map(|s| s.center.map(|c| c.0)).collect();
        let ys: Vec<f32> = face_samples.iter().filter_map(|s| s.center.map(|c| c.1)).collect();
        let head_motion_std = if xs.len() >= 3 {
            (variance(&xs) + variance(&ys)).sqrt()
        } else {
            0.0
        };

        // A blink is counted on eye recovery (absent -> present), never on
        // closure. Counting closures as well doubles every blink and fires
        // on detector dropouts.
        let mut blinks = 0u32;
        let mut prev_eyes: Option<bool> = None;
        for sample in &face_samples {
            if prev_eyes == Some(false) && sample.eyes_found {
                blinks += 1;
            }
            prev_eyes = Some(sample.eyes_found);
        }
        let blink_per_min = blinks as f32 / (self.span_ms as f32 / 1000.0) * 60.0;

        DerivedMetrics {
            blink_per_min,
            closed_ratio_10s: closed_ratio,
            head_motion_std,
            face_detected: true,
        }
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new(WINDOW_SPAN_MS, MIN_FACE_RATIO)
    }
}

/// Population variance
fn variance(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn face_sample(timestamp_ms: u64, eyes_found: bool, cx: f32, cy: f32) -> Sample {
        Sample {
            timestamp_ms,
            face_found: true,
            eyes_found,
            center: Some((cx, cy)),
        }
    }

    #[test]
    fn test_eviction_keeps_trailing_span() {
        let mut window = SampleWindow::default();
        for i in 0..30 {
            window.append(face_sample(i * 1000, true, 320.0, 180.0));
        }
        // 30 appends at 1 Hz: only timestamps within [19s, 29s] survive
        assert_eq!(window.len(), 11);
    }

    #[test]
    fn test_empty_window_is_absent() {
        let window = SampleWindow::default();
        assert_eq!(window.compute(), DerivedMetrics::absent());
        assert_eq!(window.compute().closed_ratio_10s, 1.0);
    }

    #[test]
    fn test_low_face_ratio_is_absent() {
        let mut window = SampleWindow::default();
        // 2 of 10 samples with a face: ratio 0.2 < 0.30
        for i in 0..10u64 {
            let found = i < 2;
            window.append(Sample {
                timestamp_ms: i * 100,
                face_found: found,
                eyes_found: found,
                center: found.then_some((100.0, 100.0)),
            });
        }
        let metrics = window.compute();
        assert!(!metrics.face_detected);
        assert_eq!(metrics.closed_ratio_10s, 1.0);
        assert_eq!(metrics.head_motion_std, 0.0);
        assert_eq!(metrics.blink_per_min, 0.0);
    }

    #[test]
    fn test_closed_ratio_over_face_subsequence() {
        let mut window = SampleWindow::default();
        // 10 face samples, eyes missing in 7
        for i in 0..10u64 {
            window.append(face_sample(i * 100, i >= 7, 100.0, 100.0));
        }
        let metrics = window.compute();
        assert!(metrics.face_detected);
        assert!((metrics.closed_ratio_10s - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_blink_counts_recovery_only() {
        let mut window = SampleWindow::default();
        // open, closed, open, closed, closed, open: two recoveries
        for (i, eyes) in [true, false, true, false, false, true].iter().enumerate() {
            window.append(face_sample(i as u64 * 100, *eyes, 100.0, 100.0));
        }
        let metrics = window.compute();
        assert!((metrics.blink_per_min - 12.0).abs() < 1e-6);

        // true->false and steady-state transitions never add to the count
        let mut steady = SampleWindow::default();
        for (i, eyes) in [true, true, false, false].iter().enumerate() {
            steady.append(face_sample(i as u64 * 100, *eyes, 100.0, 100.0));
        }
        assert_eq!(steady.compute().blink_per_min, 0.0);
    }

    #[test]
    fn test_blink_transitions_ignore_faceless_gaps() {
        let mut window = SampleWindow::default();
        window.append(face_sample(0, false, 100.0, 100.0));
        window.append(Sample::absent(100));
        window.append(face_sample(200, true, 100.0, 100.0));
        window.append(face_sample(300, true, 100.0, 100.0));
        window.append(face_sample(400, true, 100.0, 100.0));
        // The faceless sample is skipped; false -> true still counts once
        let metrics = window.compute();
        assert!((metrics.blink_per_min - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_head_motion_needs_three_centers() {
        let mut window = SampleWindow::default();
        window.append(face_sample(0, true, 0.0, 0.0));
        window.append(face_sample(100, true, 50.0, 50.0));
        window.append(Sample {
            timestamp_ms: 200,
            face_found: true,
            eyes_found: true,
            center: None,
        });
        assert_eq!(window.compute().head_motion_std, 0.0);

        window.append(face_sample(300, true, 100.0, 100.0));
        assert!(window.compute().head_motion_std > 0.0);
    }

    #[test]
    fn test_head_motion_combines_axes() {
        let mut window = SampleWindow::default();
        for (i, x) in [0.0f32, 10.0, 20.0].iter().enumerate() {
            window.append(face_sample(i as u64 * 100, true, *x, 0.0));
        }
        // var(x) of {0,10,20} = 200/3, var(y) = 0
        let expected = (200.0f32 / 3.0).sqrt();
        assert!((window.compute().head_motion_std - expected).abs() < 1e-3);
    }

    #[test]
    fn test_compute_is_idempotent() {
        let mut window = SampleWindow::default();
        for i in 0..20u64 {
            window.append(face_sample(i * 100, i % 3 != 0, 100.0 + i as f32, 90.0));
        }
        assert_eq!(window.compute(), window.compute());
    }

    proptest! {
        #[test]
        fn prop_window_never_exceeds_span(deltas in prop::collection::vec(0u64..5_000, 1..200)) {
            let mut window = SampleWindow::default();
            let mut now = 0u64;
            for delta in deltas {
                now += delta;
                window.append(Sample::absent(now));
                let newest = now;
                prop_assert!(window.len() > 0);
                for sample in window.samples.iter() {
                    prop_assert!(newest.saturating_sub(sample.timestamp_ms) <= WINDOW_SPAN_MS);
                }
            }
        }

        #[test]
        fn prop_closed_ratio_in_unit_range(eyes in prop::collection::vec(any::<bool>(), 1..100)) {
            let mut window = SampleWindow::default();
            for (i, e) in eyes.iter().enumerate() {
                window.append(face_sample(i as u64 * 50, *e, 10.0, 10.0));
            }
            let metrics = window.compute();
            prop_assert!((0.0..=1.0).contains(&metrics.closed_ratio_10s));
            prop_assert!(metrics.head_motion_std >= 0.0);
            prop_assert!(metrics.blink_per_min >= 0.0);
        }
    }
}
