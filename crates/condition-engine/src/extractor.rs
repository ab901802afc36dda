//! Per-frame face and eye presence extraction
//!
//! Stateless per call: one frame in, one [`Sample`] out. Detectors run
//! ONNX sessions when model paths are configured; without models they
//! fall back to a classical luminance heuristic that is coarse but
//! sufficient for presence/absence signals.

use crate::engine::EngineConfig;
use crate::window::Sample;
use crate::EngineError;
use frame_source::VideoFrame;
use image::imageops::FilterType;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::{info, warn};

/// Fraction of the frame mean below which a pixel counts as a dark
/// facial feature (eyes, brows, nostrils, mouth)
const DARK_FEATURE_FACTOR: f32 = 0.6;
/// Plausible dark-feature coverage for a frame that contains a face
const MIN_FEATURE_RATIO: f32 = 0.005;
const MAX_FEATURE_RATIO: f32 = 0.20;
/// Eye band geometry within the face region
const EYE_BAND_INSET_X: f32 = 0.10;
const EYE_BAND_HEIGHT: f32 = 0.45;
/// Dark-pixel cut and minimum coverage for "an eye region is visible"
const EYE_DARK_FACTOR: f32 = 0.55;
const MIN_EYE_DARK_RATIO: f32 = 0.02;

/// Approximate face bounding box in frame pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceRegion {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Face presence detector
pub struct FaceDetector {
    confidence_threshold: f32,
    session: Option<Session>,
}

impl FaceDetector {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let session = match &config.face_model_path {
            Some(path) => {
                info!("Loading face detection model from {}", path);
                Some(load_session(path)?)
            }
            None => {
                info!("No face model configured, using luminance heuristic");
                None
            }
        };

        Ok(Self {
            confidence_threshold: config.face_confidence,
            session,
        })
    }

    /// Find the most prominent face in the frame, if any
    pub fn detect(&self, frame: &VideoFrame) -> Result<Option<FaceRegion>, EngineError> {
        match &self.session {
            Some(session) => self.detect_model(session, frame),
            None => Ok(self.detect_heuristic(frame)),
        }
    }

    /// UltraFace-style model: scores `[1, N, 2]` and normalized corner
    /// boxes `[1, N, 4]`; the single best box above threshold wins.
    fn detect_model(
        &self,
        session: &Session,
        frame: &VideoFrame,
    ) -> Result<Option<FaceRegion>, EngineError> {
        let img = image::ImageBuffer::<image::Rgb<u8>, _>::from_raw(
            frame.width,
            frame.height,
            frame.data.as_slice(),
        )
        .ok_or_else(|| EngineError::ImageProcessing("pixel buffer mismatch".into()))?;
        let resized = image::imageops::resize(&img, 320, 240, FilterType::Triangle);

        let mut input = Array4::<f32>::zeros((1, 3, 240, 320));
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = (pixel[0] as f32 - 127.0) / 128.0;
            input[[0, 1, y as usize, x as usize]] = (pixel[1] as f32 - 127.0) / 128.0;
            input[[0, 2, y as usize, x as usize]] = (pixel[2] as f32 - 127.0) / 128.0;
        }

        let outputs = session
            .run(ort::inputs![input].map_err(|e| EngineError::Inference(e.to_string()))?)
            .map_err(|e| EngineError::Inference(e.to_string()))?;

        let scores = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::Inference(e.to_string()))?;
        let boxes = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::Inference(e.to_string()))?;

        let candidates = scores.shape()[1];
        let mut best: Option<(usize, f32)> = None;
        for n in 0..candidates {
            let confidence = scores[[0, n, 1]];
            if confidence >= self.confidence_threshold
                && best.map_or(true, |(_, c)| confidence > c)
            {
                best = Some((n, confidence));
            }
        }

        Ok(best.map(|(n, confidence)| {
            let x1 = boxes[[0, n, 0]].clamp(0.0, 1.0) * frame.width as f32;
            let y1 = boxes[[0, n, 1]].clamp(0.0, 1.0) * frame.height as f32;
            let x2 = boxes[[0, n, 2]].clamp(0.0, 1.0) * frame.width as f32;
            let y2 = boxes[[0, n, 3]].clamp(0.0, 1.0) * frame.height as f32;
            FaceRegion {
                x: x1,
                y: y1,
                width: (x2 - x1).max(0.0),
                height: (y2 - y1).max(0.0),
                confidence,
            }
        }))
    }

    /// Classical fallback: the bounding box of dark facial features.
    /// A face at conversational distance leaves a cluster of dark pixels
    /// (eyes, brows, nostrils, mouth) covering a small but non-trivial
    /// share of the frame.
    fn detect_heuristic(&self, frame: &VideoFrame) -> Option<FaceRegion> {
        let gray = frame.to_grayscale();
        if gray.is_empty() {
            return None;
        }
        let mean = gray.iter().map(|&v| v as f32).sum::<f32>() / gray.len() as f32;
        let cut = mean * DARK_FEATURE_FACTOR;

        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);
        let mut count = 0usize;
        for (i, &value) in gray.iter().enumerate() {
            if (value as f32) < cut {
                let x = i as u32 % frame.width;
                let y = i as u32 / frame.width;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
                count += 1;
            }
        }

        let ratio = count as f32 / gray.len() as f32;
        if !(MIN_FEATURE_RATIO..=MAX_FEATURE_RATIO).contains(&ratio) {
            return None;
        }

        let width = max_x - min_x + 1;
        let height = max_y - min_y + 1;
        if width < frame.width / 8 || height < frame.height / 8 {
            return None;
        }

        Some(FaceRegion {
            x: min_x as f32,
            y: min_y as f32,
            width: width as f32,
            height: height as f32,
            confidence: 0.5,
        })
    }
}

/// Eye presence detector, scoped to the upper band of a face region
pub struct EyeDetector {
    session: Option<Session>,
}

impl EyeDetector {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let session = match &config.eye_model_path {
            Some(path) => {
                info!("Loading eye model from {}", path);
                Some(load_session(path)?)
            }
            None => None,
        };
        Ok(Self { session })
    }

    /// Is an eye region visible within the face?
    pub fn detect(&self, frame: &VideoFrame, face: &FaceRegion) -> Result<bool, EngineError> {
        let Some(band) = eye_band(frame, face) else {
            return Ok(false);
        };

        match &self.session {
            Some(session) => self.detect_model(session, &band),
            None => Ok(detect_band_heuristic(&band)),
        }
    }

    /// Open/closed classifier on the grayscale band, output `[1, 2]`
    /// as (closed, open) logits
    fn detect_model(&self, session: &Session, band: &VideoFrame) -> Result<bool, EngineError> {
        let gray = band.to_grayscale();
        let img = image::GrayImage::from_raw(band.width, band.height, gray)
            .ok_or_else(|| EngineError::ImageProcessing("band buffer mismatch".into()))?;
        let resized = image::imageops::resize(&img, 24, 24, FilterType::Triangle);

        let mut input = Array4::<f32>::zeros((1, 1, 24, 24));
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
        }

        let outputs = session
            .run(ort::inputs![input].map_err(|e| EngineError::Inference(e.to_string()))?)
            .map_err(|e| EngineError::Inference(e.to_string()))?;
        let logits = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::Inference(e.to_string()))?;

        Ok(logits[[0, 1]] > logits[[0, 0]])
    }
}

/// Crop the eye band: upper part of the face region, inset horizontally
fn eye_band(frame: &VideoFrame, face: &FaceRegion) -> Option<VideoFrame> {
    let band_x = (face.x + face.width * EYE_BAND_INSET_X).max(0.0) as u32;
    let band_y = face.y.max(0.0) as u32;
    let band_w = (face.width * (1.0 - 2.0 * EYE_BAND_INSET_X)) as u32;
    let band_h = (face.height * EYE_BAND_HEIGHT) as u32;
    if band_w == 0 || band_h == 0 {
        return None;
    }
    let band_w = band_w.min(frame.width.saturating_sub(band_x));
    let band_h = band_h.min(frame.height.saturating_sub(band_y));
    if band_w == 0 || band_h == 0 {
        return None;
    }
    frame.crop(band_x, band_y, band_w, band_h)
}

/// Open eyes leave dark pupil/iris clusters against skin; a band with
/// no dark contrast reads as eyes absent (closed or occluded).
fn detect_band_heuristic(band: &VideoFrame) -> bool {
    let gray = band.to_grayscale();
    if gray.is_empty() {
        return false;
    }
    let mean = gray.iter().map(|&v| v as f32).sum::<f32>() / gray.len() as f32;
    let cut = mean * EYE_DARK_FACTOR;
    let dark = gray.iter().filter(|&&v| (v as f32) < cut).count();
    dark as f32 / gray.len() as f32 >= MIN_EYE_DARK_RATIO
}

/// Combined per-frame extractor producing one [`Sample`] per tick
pub struct FeatureExtractor {
    face: FaceDetector,
    eye: EyeDetector,
}

impl FeatureExtractor {
    /// Fatal on an unloadable configured model: the engine must fail
    /// loudly at startup rather than silently report `noface` forever.
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            face: FaceDetector::new(config)?,
            eye: EyeDetector::new(config)?,
        })
    }

    /// Extract presence features from one frame
    pub fn extract(&self, frame: &VideoFrame) -> Result<Sample, EngineError> {
        let Some(face) = self.face.detect(frame)? else {
            return Ok(Sample::absent(frame.timestamp_ms));
        };

        let eyes_found = match self.eye.detect(frame, &face) {
            Ok(found) => found,
            Err(e) => {
                warn!("Eye detection failed, treating eyes as absent: {}", e);
                false
            }
        };

        Ok(Sample {
            timestamp_ms: frame.timestamp_ms,
            face_found: true,
            eyes_found,
            center: Some(face.center()),
        })
    }
}

fn load_session(path: &str) -> Result<Session, EngineError> {
    Session::builder()
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| EngineError::ModelLoad(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White frame with optional dark rectangles painted on
    fn frame_with_marks(marks: &[(u32, u32, u32, u32)]) -> VideoFrame {
        let (w, h) = (64u32, 64u32);
        let mut data = vec![255u8; (w * h * 3) as usize];
        for &(mx, my, mw, mh) in marks {
            for y in my..my + mh {
                for x in mx..mx + mw {
                    let idx = ((y * w + x) * 3) as usize;
                    data[idx] = 0;
                    data[idx + 1] = 0;
                    data[idx + 2] = 0;
                }
            }
        }
        VideoFrame::new(data, w, h, 1000, 0)
    }

    #[test]
    fn test_blank_frame_has_no_face() {
        let extractor = FeatureExtractor::new(&EngineConfig::default()).unwrap();
        let sample = extractor.extract(&frame_with_marks(&[])).unwrap();
        assert!(!sample.face_found);
        assert!(!sample.eyes_found);
        assert!(sample.center.is_none());
        assert_eq!(sample.timestamp_ms, 1000);
    }

    #[test]
    fn test_feature_cluster_is_a_face() {
        let extractor = FeatureExtractor::new(&EngineConfig::default()).unwrap();
        // 16x16 dark cluster at (24, 24): 6.25% coverage
        let sample = extractor.extract(&frame_with_marks(&[(24, 24, 16, 16)])).unwrap();
        assert!(sample.face_found);
        assert_eq!(sample.center, Some((32.0, 32.0)));
    }

    #[test]
    fn test_full_dark_frame_is_not_a_face() {
        let extractor = FeatureExtractor::new(&EngineConfig::default()).unwrap();
        // Covered lens: the dark region is the whole frame, mean is flat
        let sample = extractor.extract(&frame_with_marks(&[(0, 0, 64, 64)])).unwrap();
        assert!(!sample.face_found);
    }

    #[test]
    fn test_tiny_speck_is_not_a_face() {
        let detector = FaceDetector::new(&EngineConfig::default()).unwrap();
        let frame = frame_with_marks(&[(30, 30, 2, 2)]);
        assert!(detector.detect(&frame).unwrap().is_none());
    }

    #[test]
    fn test_eye_band_with_pupil_contrast() {
        let eye = EyeDetector::new(&EngineConfig::default()).unwrap();
        // Two 2x2 pupils at rows 30-31
        let frame = frame_with_marks(&[(24, 30, 2, 2), (40, 30, 2, 2)]);
        let face = FaceRegion {
            x: 20.0,
            y: 26.0,
            width: 28.0,
            height: 16.0,
            confidence: 0.5,
        };
        assert!(eye.detect(&frame, &face).unwrap());
    }

    #[test]
    fn test_flat_eye_band_reads_closed() {
        let eye = EyeDetector::new(&EngineConfig::default()).unwrap();
        let frame = frame_with_marks(&[]);
        let face = FaceRegion {
            x: 20.0,
            y: 26.0,
            width: 28.0,
            height: 16.0,
            confidence: 0.5,
        };
        assert!(!eye.detect(&frame, &face).unwrap());
    }

    #[test]
    fn test_degenerate_face_region_reads_closed() {
        let eye = EyeDetector::new(&EngineConfig::default()).unwrap();
        let frame = frame_with_marks(&[]);
        let face = FaceRegion {
            x: 63.0,
            y: 63.0,
            width: 0.5,
            height: 0.5,
            confidence: 0.5,
        };
        assert!(!eye.detect(&frame, &face).unwrap());
    }

    #[test]
    fn test_missing_model_path_is_fatal() {
        let config = EngineConfig {
            face_model_path: Some("/nonexistent/face.onnx".into()),
            ..Default::default()
        };
        assert!(matches!(
            FeatureExtractor::new(&config),
            Err(EngineError::ModelLoad(_))
        ));
    }
}
