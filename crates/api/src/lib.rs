//! Condition Sentinel API Server
//!
//! JSON/streaming surface consumed by the dashboard and the remote
//! frame uploader. All handlers only read the published snapshot/frame
//! or feed the push source; none of them ever touch the capture
//! pipeline's internals.

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub mod policy;
pub mod routes;
pub mod settings;

pub use settings::Settings;

use condition_engine::SharedCondition;
use event_log::EventLog;
use frame_source::frame::now_ms;
use frame_source::FrameSender;

/// Snapshot older than this counts as a stalled engine in health checks
const ENGINE_STALE_AFTER_MS: u64 = 2_000;

/// Application state shared across handlers
pub struct AppState {
    /// Published snapshot/frame holder (read-only here)
    pub shared: Arc<SharedCondition>,
    /// State-change event repository
    pub events: Arc<EventLog>,
    /// Feeding handle for the push frame source
    pub frames: FrameSender,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
    pub metrics: SystemMetrics,
}

#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub engine: ComponentHealth,
    pub event_log: ComponentHealth,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub last_activity_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SystemMetrics {
    pub event_count: usize,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/condition", get(routes::condition::get_condition))
        .route("/api/v1/events", get(routes::events::get_events))
        .route("/api/v1/interaction", post(routes::interaction::post_interaction))
        .route("/upload_frame", post(routes::stream::upload_frame))
        .route("/video_feed", get(routes::stream::video_feed))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = now_ms();
    let snapshot = state.shared.get_snapshot();

    let engine = if snapshot.last_update_ts == 0 {
        ComponentHealth {
            status: "waiting".to_string(),
            last_activity_ms: None,
        }
    } else {
        let age = now.saturating_sub(snapshot.last_update_ts);
        let status = if age <= ENGINE_STALE_AFTER_MS { "ok" } else { "stale" };
        ComponentHealth {
            status: status.to_string(),
            last_activity_ms: Some(age),
        }
    };

    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: now / 1000,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            engine,
            event_log: ComponentHealth {
                status: "ok".to_string(),
                last_activity_ms: None,
            },
        },
        metrics: SystemMetrics {
            event_count: state.events.len(),
        },
    };

    Json(response)
}

/// Initialize logging
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Run the server until process shutdown
pub async fn run_server(addr: &str, state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
