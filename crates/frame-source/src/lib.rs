//! Frame Acquisition Layer
//!
//! A single abstraction over "where frames come from":
//! - [`PushFrameSource`]: a single-slot queue fed by externally uploaded
//!   images (remote capture device posting JPEGs over HTTP)
//! - `CameraSource` (feature `camera`): a locally attached capture device
//!
//! Whichever variant is chosen at construction time, the source is owned
//! exclusively by the capture loop for the process lifetime. `acquire`
//! never blocks beyond a bounded per-call wait.

pub mod frame;
pub mod push;

#[cfg(feature = "camera")]
pub mod camera;

pub use frame::VideoFrame;
pub use push::{FrameSender, PushFrameSource};

#[cfg(feature = "camera")]
pub use camera::CameraSource;

use thiserror::Error;

/// Frame source error types
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Failed to open device: {0}")]
    Open(String),

    #[error("Invalid frame payload: {0}")]
    Payload(String),

    #[error("Acquire timeout")]
    Timeout,

    #[error("Source poisoned")]
    Poisoned,
}

/// Supplies one frame per request.
///
/// `acquire` returns `None` when no frame is available within the
/// source's per-call time bound — the caller treats that tick as an
/// empty observation and carries on.
pub trait FrameSource: Send {
    fn acquire(&mut self) -> Option<VideoFrame>;
}

/// Source geometry and timing configuration
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Device index for the local camera variant
    pub camera_index: u32,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Upper bound on a single `acquire` call (milliseconds)
    pub acquire_timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            width: 640,
            height: 360,
            acquire_timeout_ms: 2000,
        }
    }
}
