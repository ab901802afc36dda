//! Condition Estimation Engine
//!
//! Estimates a person's momentary behavioral state from coarse per-frame
//! face/eye presence signals:
//! - per-frame feature extraction (face present, eyes present, face center)
//! - rolling 10-second window aggregation
//! - ordered threshold classification against a self-adapting baseline
//! - a capture loop that owns the frame source and publishes snapshots
//!
//! The engine produces explainable state labels (`tired`, `tense`,
//! `neutral`, `noface`, `noresponse`), not identity or precise gaze.

pub mod baseline;
pub mod classifier;
pub mod engine;
pub mod extractor;
pub mod publisher;
pub mod window;

pub use baseline::Baseline;
pub use classifier::{classify, ConditionState};
pub use engine::{CaptureLoop, ConditionEvent, EngineConfig};
pub use extractor::{FaceRegion, FeatureExtractor};
pub use publisher::{ConditionSnapshot, SharedCondition};
pub use window::{DerivedMetrics, Sample, SampleWindow};

use thiserror::Error;

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Thread spawn failed: {0}")]
    Spawn(String),
}
