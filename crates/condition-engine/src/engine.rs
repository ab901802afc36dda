//! Capture loop: the single thread that owns the frame source

use crate::baseline::{Baseline, DEFAULT_ALPHA};
use crate::classifier::{classify, ConditionState};
use crate::extractor::FeatureExtractor;
use crate::publisher::{ConditionSnapshot, SharedCondition};
use crate::window::{Sample, SampleWindow, MIN_FACE_RATIO, WINDOW_SPAN_MS};
use crate::EngineError;
use frame_source::frame::now_ms;
use frame_source::FrameSource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed interval between capture-loop ticks (milliseconds)
    pub tick_interval_ms: u64,
    /// Trailing window span (milliseconds)
    pub window_span_ms: u64,
    /// Face-presence ratio at which the window counts as face-detected
    pub min_face_ratio: f32,
    /// Closed-ratio margin over the baseline for `tired`
    pub closed_margin: f32,
    /// Head-motion margin over the baseline for `tense`
    pub motion_margin: f32,
    /// Interaction silence before `noresponse` is considered (seconds)
    pub noresponse_after_secs: f32,
    /// Motion below this fraction of the baseline counts as still
    pub low_motion_factor: f32,
    /// EMA smoothing factor for the baseline adapter
    pub baseline_alpha: f32,
    /// Optional ONNX face detector model
    pub face_model_path: Option<String>,
    /// Optional ONNX eye openness model
    pub eye_model_path: Option<String>,
    /// Face detection confidence threshold (model path only)
    pub face_confidence: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            window_span_ms: WINDOW_SPAN_MS,
            min_face_ratio: MIN_FACE_RATIO,
            closed_margin: 0.20,
            motion_margin: 10.0,
            noresponse_after_secs: 12.0,
            low_motion_factor: 0.7,
            baseline_alpha: DEFAULT_ALPHA,
            face_model_path: None,
            eye_model_path: None,
            face_confidence: 0.7,
        }
    }
}

/// Emitted each time the classified state differs from the previous
/// tick's state; the first classification after startup always emits
/// one. Intended for an external append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionEvent {
    pub timestamp_ms: u64,
    pub state: ConditionState,
    pub blink_per_min: f32,
    pub closed_ratio_10s: f32,
    pub head_motion_std: f32,
}

/// Drives the pipeline once per tick and publishes the result.
///
/// Exclusively owns the frame source for the process lifetime. There is
/// no termination transition: on repeated acquisition failure the loop
/// degrades to continuously reporting `noface`, it never stops.
pub struct CaptureLoop {
    config: EngineConfig,
    source: Box<dyn FrameSource>,
    extractor: FeatureExtractor,
    window: SampleWindow,
    baseline: Baseline,
    shared: Arc<SharedCondition>,
    events: Option<mpsc::Sender<ConditionEvent>>,
    last_state: Option<ConditionState>,
}

impl CaptureLoop {
    /// Build the pipeline. Detector construction happens here so a bad
    /// model configuration fails loudly before the loop ever starts.
    pub fn new(
        config: EngineConfig,
        source: Box<dyn FrameSource>,
        shared: Arc<SharedCondition>,
        events: Option<mpsc::Sender<ConditionEvent>>,
    ) -> Result<Self, EngineError> {
        let extractor = FeatureExtractor::new(&config)?;
        let window = SampleWindow::new(config.window_span_ms, config.min_face_ratio);
        Ok(Self {
            config,
            source,
            extractor,
            window,
            baseline: Baseline::default(),
            shared,
            events,
            last_state: None,
        })
    }

    /// One steady-state cycle: acquire, extract, aggregate, classify,
    /// adapt, publish. Never panics out; a bad tick publishes a safe
    /// degraded snapshot instead.
    fn tick(&mut self) {
        let now = now_ms();
        let frame = self.source.acquire();

        let sample = match &frame {
            Some(frame) => match self.extractor.extract(frame) {
                Ok(sample) => sample,
                Err(e) => {
                    warn!("Feature extraction failed this tick: {}", e);
                    self.window.append(Sample::absent(now));
                    self.publish(ConditionState::NoFace, ConditionSnapshot::absent(now), Some(frame.clone()));
                    return;
                }
            },
            None => {
                debug!("Frame acquisition yielded nothing this tick");
                Sample::absent(now)
            }
        };

        self.window.append(sample);
        let metrics = self.window.compute();
        let since = self.shared.secs_since_interaction(now);
        let state = classify(&metrics, since, &self.baseline, &self.config);

        // The baseline adapts only while the subject reads as neutral,
        // so tired/tense stretches cannot normalize themselves away.
        if state == ConditionState::Neutral {
            self.baseline.update(&metrics, self.config.baseline_alpha);
        }

        let snapshot = ConditionSnapshot::from_metrics(state, &metrics, now);
        self.publish(state, snapshot, frame);
    }

    fn publish(
        &mut self,
        state: ConditionState,
        snapshot: ConditionSnapshot,
        frame: Option<frame_source::VideoFrame>,
    ) {
        let event = (self.last_state != Some(state)).then(|| ConditionEvent {
            timestamp_ms: snapshot.last_update_ts,
            state,
            blink_per_min: snapshot.blink_per_min,
            closed_ratio_10s: snapshot.closed_ratio_10s,
            head_motion_std: snapshot.head_motion_std,
        });

        self.shared.publish_snapshot(snapshot);
        if let Some(frame) = frame {
            self.shared.publish_frame(frame);
        }

        if let Some(event) = event {
            match self.last_state {
                Some(prev) => info!("Condition changed: {} -> {}", prev, state),
                None => info!("Initial condition: {}", state),
            }
            self.last_state = Some(state);
            if let Some(tx) = &self.events {
                // Drop on a full channel; the log consumer catches up
                // from the next change, the loop never blocks on it.
                let _ = tx.try_send(event);
            }
        }
    }

    /// Run forever on the current thread
    pub fn run(mut self) {
        info!(
            "Capture loop started (tick {} ms, window {} ms)",
            self.config.tick_interval_ms, self.config.window_span_ms
        );
        let interval = Duration::from_millis(self.config.tick_interval_ms);
        loop {
            self.tick();
            std::thread::sleep(interval);
        }
    }

    /// Spawn the loop on its own named worker thread
    pub fn spawn(self) -> Result<JoinHandle<()>, EngineError> {
        std::thread::Builder::new()
            .name("capture-loop".into())
            .spawn(move || self.run())
            .map_err(|e| EngineError::Spawn(e.to_string()))
    }
}
