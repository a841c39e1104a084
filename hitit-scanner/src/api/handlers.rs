//! HTTP request handlers

use crate::api::server::AppContext;
use crate::playback::{PlaybackOutcome, PlaybackRequest, TEST_TRACK_ID};
use crate::scanner::ScannerUiState;
use crate::settings::{DebugSettings, SettingsUpdate};
use axum::{extract::State, http::StatusCode, Json};
use hitit_common::events::{DeviceOrientation, PlaybackMode, ScannerPhase};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<StatusResponse>)>;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    card_count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<StatusResponse>) {
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", message.into()),
        }),
    )
}

/// Scanner state as rendered by the front end
#[derive(Debug, Serialize)]
pub struct ScannerStateResponse {
    session_id: Uuid,
    phase: ScannerPhase,
    status_text: String,
    #[serde(flatten)]
    state: ScannerUiState,
}

impl ScannerStateResponse {
    fn new(session_id: Uuid, state: ScannerUiState) -> Self {
        Self {
            session_id,
            phase: state.phase(),
            status_text: state.status.to_string(),
            state,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    code: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanErrorRequest {
    error: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    accepted: bool,
    #[serde(flatten)]
    scanner: ScannerStateResponse,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    mode: PlaybackMode,
}

#[derive(Debug, Serialize)]
pub struct FlashlightResponse {
    flashlight_on: bool,
}

#[derive(Debug, Deserialize)]
pub struct SensorSample {
    /// Acceleration along the axis perpendicular to the screen
    z: f32,
}

#[derive(Debug, Serialize)]
pub struct SensorResponse {
    /// True when the sample changed the classified pose
    changed: bool,
    orientation: DeviceOrientation,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    release_preview: bool,
    #[serde(flatten)]
    settings: DebugSettings,
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    service: String,
    app_installed: bool,
    test_track_id: String,
}

#[derive(Debug, Serialize)]
pub struct ExternalTestResponse {
    track_id: String,
    opened: bool,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "hitit-scanner".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        card_count: ctx.card_count,
    })
}

// ============================================================================
// Scanner Endpoints
// ============================================================================

async fn scanner_state(ctx: &AppContext) -> ScannerStateResponse {
    ScannerStateResponse::new(ctx.session.id(), ctx.session.state().await)
}

/// GET /scanner/state
pub async fn get_scanner_state(State(ctx): State<AppContext>) -> Json<ScannerStateResponse> {
    Json(scanner_state(&ctx).await)
}

/// POST /scanner/scan - Feed a decoded QR code
pub async fn scan(
    State(ctx): State<AppContext>,
    Json(req): Json<ScanRequest>,
) -> ApiResult<AcceptedResponse> {
    if req.code.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "code must not be empty"));
    }

    let accepted = ctx.session.on_qr_code_scanned(&req.code).await;
    Ok(Json(AcceptedResponse {
        accepted,
        scanner: scanner_state(&ctx).await,
    }))
}

/// POST /scanner/scan_error - Report a camera/decoder failure
pub async fn scan_error(
    State(ctx): State<AppContext>,
    Json(req): Json<ScanErrorRequest>,
) -> Json<ScannerStateResponse> {
    ctx.session.on_scan_error(&req.error).await;
    Json(scanner_state(&ctx).await)
}

/// POST /scanner/flip - Manual flip trigger
pub async fn flip(State(ctx): State<AppContext>) -> Json<AcceptedResponse> {
    let accepted = ctx.session.simulate_flip().await;
    Json(AcceptedResponse {
        accepted,
        scanner: scanner_state(&ctx).await,
    })
}

/// POST /scanner/reset - Scan again
pub async fn reset(State(ctx): State<AppContext>) -> Json<ScannerStateResponse> {
    ctx.session.reset().await;
    Json(scanner_state(&ctx).await)
}

/// POST /scanner/play_pause
pub async fn play_pause(State(ctx): State<AppContext>) -> Json<ScannerStateResponse> {
    ctx.session.toggle_play_pause().await;
    Json(scanner_state(&ctx).await)
}

/// POST /scanner/audio_focus_returned - The user is back from the streaming app
pub async fn audio_focus_returned(State(ctx): State<AppContext>) -> Json<ScannerStateResponse> {
    ctx.session.on_audio_focus_returned().await;
    Json(scanner_state(&ctx).await)
}

/// POST /scanner/mode
pub async fn set_mode(
    State(ctx): State<AppContext>,
    Json(req): Json<ModeRequest>,
) -> Json<ScannerStateResponse> {
    info!(mode = ?req.mode, "Playback mode selected");
    ctx.session.set_playback_mode(req.mode).await;
    Json(scanner_state(&ctx).await)
}

/// POST /scanner/flashlight
pub async fn toggle_flashlight(State(ctx): State<AppContext>) -> Json<FlashlightResponse> {
    let flashlight_on = ctx.session.toggle_flashlight().await;
    Json(FlashlightResponse { flashlight_on })
}

// ============================================================================
// Sensor Endpoint
// ============================================================================

/// POST /sensor - One accelerometer sample
pub async fn push_sensor_sample(
    State(ctx): State<AppContext>,
    Json(sample): Json<SensorSample>,
) -> ApiResult<SensorResponse> {
    if !sample.z.is_finite() {
        return Err(error_response(StatusCode::BAD_REQUEST, "z must be a finite number"));
    }

    let changed = ctx.sensor.push(sample.z);
    Ok(Json(SensorResponse {
        changed,
        orientation: ctx.monitor.current(),
    }))
}

// ============================================================================
// Settings Endpoints
// ============================================================================

/// GET /settings
pub async fn get_settings(State(ctx): State<AppContext>) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        release_preview: ctx.settings.is_release_preview(),
        settings: ctx.settings.snapshot().await,
    })
}

/// POST /settings - Partial update
pub async fn update_settings(
    State(ctx): State<AppContext>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<SettingsResponse> {
    match ctx.settings.apply(update).await {
        Ok(settings) => Ok(Json(SettingsResponse {
            release_preview: ctx.settings.is_release_preview(),
            settings,
        })),
        Err(e) => {
            error!("Failed to update settings: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

// ============================================================================
// Home Screen Endpoints
// ============================================================================

/// GET /home - Streaming app availability
pub async fn get_home(State(ctx): State<AppContext>) -> Json<HomeResponse> {
    let service = ctx.dispatcher.music_service();
    Json(HomeResponse {
        service: service.service_name().to_string(),
        app_installed: service.is_app_installed().await,
        test_track_id: TEST_TRACK_ID.to_string(),
    })
}

/// POST /home/test_external - Open the test track in the streaming app
pub async fn test_external(State(ctx): State<AppContext>) -> Json<ExternalTestResponse> {
    let opened = ctx
        .dispatcher
        .music_service()
        .play_track_by_id(TEST_TRACK_ID)
        .await;

    Json(ExternalTestResponse {
        track_id: TEST_TRACK_ID.to_string(),
        opened,
    })
}

/// POST /home/test_preview - Play the test track's preview in-app
pub async fn test_preview(State(ctx): State<AppContext>) -> Json<PlaybackOutcome> {
    let outcome = ctx
        .dispatcher
        .dispatch(PlaybackRequest::new(TEST_TRACK_ID, PlaybackMode::Preview))
        .await;
    Json(outcome)
}

/// POST /home/stop_preview
pub async fn stop_preview(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.dispatcher.stop_audio();
    Json(StatusResponse {
        status: "stopped".to_string(),
    })
}
