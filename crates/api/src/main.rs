//! Condition Sentinel - Main Entry Point

use api::{init_logging, run_server, AppState, Settings};
use condition_engine::{CaptureLoop, EngineConfig, SharedCondition};
use event_log::EventLog;
use frame_source::{FrameSource, PushFrameSource, SourceConfig};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("=== Condition Sentinel v{} ===", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;
    let source_config = SourceConfig {
        camera_index: settings.camera_index,
        width: settings.frame_width,
        height: settings.frame_height,
        acquire_timeout_ms: settings.acquire_timeout_ms,
    };

    // The push source always exists so /upload_frame stays routable;
    // the capture loop owns whichever source the settings select.
    let push = PushFrameSource::new(&source_config);
    let frames = push.sender();
    let source = select_source(&settings, &source_config, push)?;

    let engine_config = EngineConfig {
        tick_interval_ms: settings.tick_interval_ms,
        face_model_path: settings.face_model_path.clone(),
        eye_model_path: settings.eye_model_path.clone(),
        ..Default::default()
    };

    let shared = Arc::new(SharedCondition::new());
    let events = Arc::new(EventLog::new(settings.max_event_records));

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(64);
    // Detector construction is fatal here, before the loop starts
    let capture = CaptureLoop::new(engine_config, source, Arc::clone(&shared), Some(event_tx))?;
    capture.spawn()?;

    // Drain state changes into the append-only log
    let log = Arc::clone(&events);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if let Err(e) = log.append(&event) {
                warn!("Failed to log condition event: {}", e);
            }
        }
    });

    let state = Arc::new(AppState {
        shared,
        events,
        frames,
        version: env!("CARGO_PKG_VERSION").to_string(),
        start_time: std::time::Instant::now(),
    });

    run_server(&settings.listen_addr, state).await
}

#[cfg(feature = "camera")]
fn select_source(
    settings: &Settings,
    config: &SourceConfig,
    push: PushFrameSource,
) -> Result<Box<dyn FrameSource>, frame_source::FrameError> {
    if settings.use_camera {
        info!("Using local camera device {}", config.camera_index);
        Ok(Box::new(frame_source::CameraSource::open(config)?))
    } else {
        info!("Using uploaded frames as the capture source");
        Ok(Box::new(push))
    }
}

#[cfg(not(feature = "camera"))]
fn select_source(
    settings: &Settings,
    _config: &SourceConfig,
    push: PushFrameSource,
) -> Result<Box<dyn FrameSource>, frame_source::FrameError> {
    if settings.use_camera {
        warn!("use_camera is set but this build has no camera feature, using uploaded frames");
    } else {
        info!("Using uploaded frames as the capture source");
    }
    Ok(Box::new(push))
}
