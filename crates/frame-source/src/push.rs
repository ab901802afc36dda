//! Push-fed frame source
//!
//! A remote process captures frames and uploads them over HTTP; the
//! upload handler decodes each payload and drops it into a single slot
//! here. Only the newest frame is retained — the capture loop acquires
//! each frame at most once, and an uploader that outpaces the loop just
//! overwrites the slot.

use crate::frame::{now_ms, VideoFrame};
use crate::{FrameError, FrameSource, SourceConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

struct Slot {
    frame: Mutex<Option<VideoFrame>>,
    available: Condvar,
    sequence: AtomicU32,
}

/// Cloneable feeding handle for the upload path
#[derive(Clone)]
pub struct FrameSender {
    slot: Arc<Slot>,
}

impl FrameSender {
    /// Decode a JPEG payload and publish it to the slot.
    ///
    /// Returns the sequence number assigned to the frame.
    pub fn push_jpeg(&self, payload: &[u8]) -> Result<u32, FrameError> {
        let sequence = self.slot.sequence.fetch_add(1, Ordering::Relaxed);
        let frame = VideoFrame::from_jpeg(payload, now_ms(), sequence)?;
        self.push(frame);
        Ok(sequence)
    }

    /// Publish an already-decoded frame to the slot
    pub fn push(&self, frame: VideoFrame) {
        let mut slot = match self.slot.frame.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Frame slot poisoned, recovering: {}", e);
                e.into_inner()
            }
        };
        if slot.replace(frame).is_some() {
            debug!("Uploader outpacing capture loop, frame overwritten");
        }
        drop(slot);
        self.slot.available.notify_one();
    }
}

/// Single-slot frame source fed by [`FrameSender`]
pub struct PushFrameSource {
    slot: Arc<Slot>,
    timeout: Duration,
}

impl PushFrameSource {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            slot: Arc::new(Slot {
                frame: Mutex::new(None),
                available: Condvar::new(),
                sequence: AtomicU32::new(0),
            }),
            timeout: Duration::from_millis(config.acquire_timeout_ms),
        }
    }

    /// Handle for the upload path; any number of clones may feed the slot
    pub fn sender(&self) -> FrameSender {
        FrameSender {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl FrameSource for PushFrameSource {
    /// Take the pending frame, waiting at most the configured timeout
    /// for one to arrive. `None` means nothing was uploaded in time.
    fn acquire(&mut self) -> Option<VideoFrame> {
        let guard = match self.slot.frame.lock() {
            Ok(guard) => guard,
            Err(e) => e.into_inner(),
        };

        let (mut guard, result) = self
            .slot
            .available
            .wait_timeout_while(guard, self.timeout, |frame| frame.is_none())
            .unwrap_or_else(|e| e.into_inner());

        if result.timed_out() && guard.is_none() {
            return None;
        }
        guard.take()
    }
}
