//! Locally attached camera device (feature `camera`)

use crate::frame::now_ms;
use crate::{FrameError, FrameSource, SourceConfig, VideoFrame};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tracing::{info, warn};

/// Capture device source; exclusively owned by the capture loop
pub struct CameraSource {
    camera: Camera,
    sequence: u32,
}

impl CameraSource {
    /// Open the device and start streaming. Fatal if the device cannot
    /// be opened — a sentinel with no working camera must not pretend
    /// to run.
    pub fn open(config: &SourceConfig) -> Result<Self, FrameError> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(config.camera_index), requested)
            .map_err(|e| FrameError::Open(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| FrameError::Open(e.to_string()))?;

        info!(
            "Camera {} opened at {}",
            config.camera_index,
            camera.camera_format()
        );

        Ok(Self {
            camera,
            sequence: 0,
        })
    }
}

impl FrameSource for CameraSource {
    /// Read one frame from the device. The per-call bound is the
    /// driver's own read timeout; a dead device yields `None`, not a
    /// stalled loop.
    fn acquire(&mut self) -> Option<VideoFrame> {
        let buffer = match self.camera.frame() {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!("Camera read failed: {}", e);
                return None;
            }
        };

        let decoded = match buffer.decode_image::<RgbFormat>() {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Camera frame decode failed: {}", e);
                return None;
            }
        };

        let (width, height) = decoded.dimensions();
        let frame = VideoFrame::new(decoded.into_raw(), width, height, now_ms(), self.sequence);
        self.sequence = self.sequence.wrapping_add(1);
        Some(frame)
    }
}
