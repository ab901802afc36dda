//! Environment-driven settings
//!
//! Every field can be overridden with a `SENTINEL_`-prefixed variable,
//! e.g. `SENTINEL_LISTEN_ADDR=0.0.0.0:9090` or
//! `SENTINEL_FACE_MODEL_PATH=/models/face.onnx`.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Bind address for the HTTP server
    pub listen_addr: String,
    /// Local camera device index (camera feature)
    pub camera_index: u32,
    /// Capture geometry hint
    pub frame_width: u32,
    pub frame_height: u32,
    /// Upper bound on one frame-source acquire call (ms)
    pub acquire_timeout_ms: u64,
    /// Capture loop tick interval (ms)
    pub tick_interval_ms: u64,
    /// Prefer the locally attached camera over uploaded frames
    pub use_camera: bool,
    /// Optional ONNX detector models; absent paths select the
    /// classical heuristic extractor
    pub face_model_path: Option<String>,
    pub eye_model_path: Option<String>,
    /// Event log retention
    pub max_event_records: usize,
}

impl Settings {
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("listen_addr", "0.0.0.0:8080")?
            .set_default("camera_index", 0)?
            .set_default("frame_width", 640)?
            .set_default("frame_height", 360)?
            .set_default("acquire_timeout_ms", 2000)?
            .set_default("tick_interval_ms", 50)?
            .set_default("use_camera", false)?
            .set_default("max_event_records", 10_000)?
            .add_source(config::Environment::with_prefix("SENTINEL"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load_without_environment() {
        let settings = Settings::load().unwrap();
        assert_eq!(settings.listen_addr, "0.0.0.0:8080");
        assert_eq!(settings.tick_interval_ms, 50);
        assert_eq!(settings.acquire_timeout_ms, 2000);
        assert!(!settings.use_camera);
        assert!(settings.face_model_path.is_none());
    }
}
