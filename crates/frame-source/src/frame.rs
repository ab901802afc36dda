//! Video frame type and pixel helpers

use crate::FrameError;
use std::time::{SystemTime, UNIX_EPOCH};

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (epoch milliseconds)
    pub timestamp_ms: u64,
    /// Frame sequence number
    pub sequence: u32,
}

/// Current wall-clock time as epoch milliseconds
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ms: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ms,
            sequence,
        }
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Convert to grayscale (one byte per pixel)
    pub fn to_grayscale(&self) -> Vec<u8> {
        let mut gray = Vec::with_capacity((self.width * self.height) as usize);
        for pixel in self.data.chunks(3) {
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (pixel[0] as f32 * 0.299
                + pixel[1] as f32 * 0.587
                + pixel[2] as f32 * 0.114) as u8;
            gray.push(y);
        }
        gray
    }

    /// Crop a region of the frame
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Option<VideoFrame> {
        if x + w > self.width || y + h > self.height {
            return None;
        }

        let mut cropped = Vec::with_capacity((w * h * 3) as usize);
        for row in y..(y + h) {
            let start = ((row * self.width + x) * 3) as usize;
            let end = start + (w * 3) as usize;
            cropped.extend_from_slice(&self.data[start..end]);
        }

        Some(VideoFrame {
            data: cropped,
            width: w,
            height: h,
            timestamp_ms: self.timestamp_ms,
            sequence: self.sequence,
        })
    }

    /// Decode a JPEG payload (as posted by the remote uploader) into RGB
    pub fn from_jpeg(payload: &[u8], timestamp_ms: u64, sequence: u32) -> Result<Self, FrameError> {
        let img = image::load_from_memory_with_format(payload, image::ImageFormat::Jpeg)
            .map_err(|e| FrameError::Payload(e.to_string()))?;
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        Ok(Self {
            data: rgb.into_raw(),
            width,
            height,
            timestamp_ms,
            sequence,
        })
    }

    /// Re-encode as JPEG for broadcast to viewers
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, FrameError> {
        let buf = image::RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| FrameError::Payload("pixel buffer does not match geometry".into()))?;

        let mut out = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality)
            .encode_image(&buf)
            .map_err(|e| FrameError::Payload(e.to_string()))?;
        Ok(out)
    }
}
