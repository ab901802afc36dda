//! Frame ingestion and re-broadcast routes

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::AppState;

/// Repaint cadence for the broadcast stream; independent of the capture
/// loop's tick, slow pollers just get the same frame again
const BROADCAST_INTERVAL_MS: u64 = 100;
const BROADCAST_JPEG_QUALITY: u8 = 70;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub sequence: u32,
}

/// Accept one JPEG frame from the remote uploader and feed it into the
/// push source's single slot.
pub async fn upload_frame(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<UploadResponse>, StatusCode> {
    if body.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.frames.push_jpeg(&body) {
        Ok(sequence) => Ok(Json(UploadResponse { ok: true, sequence })),
        Err(e) => {
            warn!("Rejected uploaded frame: {}", e);
            Err(StatusCode::BAD_REQUEST)
        }
    }
}

/// MJPEG re-broadcast of the latest published frame.
///
/// Each part re-encodes whatever frame the capture loop last published;
/// no history is buffered and viewers never touch the frame source.
pub async fn video_feed(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(2);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(BROADCAST_INTERVAL_MS));
        loop {
            ticker.tick().await;
            let Some(frame) = state.shared.get_latest_frame() else {
                continue;
            };
            let jpeg = match frame.to_jpeg(BROADCAST_JPEG_QUALITY) {
                Ok(jpeg) => jpeg,
                Err(e) => {
                    warn!("Broadcast frame encode failed: {}", e);
                    continue;
                }
            };

            let mut part = Vec::with_capacity(jpeg.len() + 64);
            part.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
            part.extend_from_slice(&jpeg);
            part.extend_from_slice(b"\r\n");

            if tx.send(Ok(Bytes::from(part))).await.is_err() {
                debug!("Viewer disconnected from video feed");
                break;
            }
        }
    });

    (
        [(
            header::CONTENT_TYPE,
            "multipart/x-mixed-replace; boundary=frame",
        )],
        Body::from_stream(ReceiverStream::new(rx)),
    )
}
