//! HTTP server setup and routing

use crate::error::{Error, Result};
use crate::orientation::OrientationMonitor;
use crate::platform::RemoteAccelerometer;
use crate::playback::PlaybackDispatcher;
use crate::scanner::ScannerSession;
use crate::settings::SettingsService;
use axum::{
    routing::{get, post},
    Router,
};
use hitit_common::events::EventBus;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub session: Arc<ScannerSession>,
    pub settings: Arc<SettingsService>,
    /// Accelerometer fed by `POST /sensor`
    pub sensor: Arc<RemoteAccelerometer>,
    pub monitor: Arc<OrientationMonitor>,
    pub dispatcher: Arc<PlaybackDispatcher>,
    pub events: EventBus,
    /// Number of cards the repository knows, when it can tell
    pub card_count: Option<usize>,
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Scanner session
        .route("/scanner/state", get(super::handlers::get_scanner_state))
        .route("/scanner/scan", post(super::handlers::scan))
        .route("/scanner/scan_error", post(super::handlers::scan_error))
        .route("/scanner/flip", post(super::handlers::flip))
        .route("/scanner/reset", post(super::handlers::reset))
        .route("/scanner/play_pause", post(super::handlers::play_pause))
        .route("/scanner/audio_focus_returned", post(super::handlers::audio_focus_returned))
        .route("/scanner/mode", post(super::handlers::set_mode))
        .route("/scanner/flashlight", post(super::handlers::toggle_flashlight))

        // Accelerometer samples from the device
        .route("/sensor", post(super::handlers::push_sensor_sample))

        // Debug settings
        .route("/settings", get(super::handlers::get_settings))
        .route("/settings", post(super::handlers::update_settings))

        // Home screen
        .route("/home", get(super::handlers::get_home))
        .route("/home/test_external", post(super::handlers::test_external))
        .route("/home/test_preview", post(super::handlers::test_preview))
        .route("/home/stop_preview", post(super::handlers::stop_preview))

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Front ends run from other origins (device webviews, dev servers)
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API until `shutdown` completes
pub async fn run<F>(ctx: AppContext, bind_address: &str, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(ctx);

    let addr = format!("{}:{}", bind_address, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("Starting HTTP server on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
