//! Integration tests for the HitIt Scanner API
//!
//! Requests go through the real router with `oneshot`; the session behind it
//! is wired to the recording fakes from `helpers`.

mod helpers;

use axum::body::Body;
use axum::http::StatusCode;
use helpers::*;
use hitit_scanner::api::{create_router, AppContext};
use http::{Method, Request};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn router_for(h: &Harness) -> axum::Router {
    create_router(AppContext {
        session: h.session.clone(),
        settings: h.settings.clone(),
        sensor: h.sensor.clone(),
        monitor: h.monitor.clone(),
        dispatcher: h.dispatcher.clone(),
        events: h.events.clone(),
        card_count: Some(308),
    })
}

async fn make_request(
    app: &axum::Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(path);

    let request = match body {
        Some(json_body) => {
            request = request.header("content-type", "application/json");
            request.body(Body::from(json_body.to_string())).unwrap()
        }
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, body)
}

#[tokio::test]
async fn test_health_endpoint() {
    let h = Harness::new().await;
    let app = router_for(&h);

    let (status, body) = make_request(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "hitit-scanner");
    assert_eq!(body["card_count"], 308);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_initial_scanner_state() {
    let h = Harness::new().await;
    let app = router_for(&h);

    let (status, body) = make_request(&app, Method::GET, "/scanner/state", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["status"]["kind"], "point_camera");
    assert_eq!(body["selected_playback_mode"], "preview");
    assert_eq!(body["session_id"], h.session.id().to_string());
    assert!(body["status_text"].is_string());
}

#[tokio::test]
async fn test_scan_flip_reset_over_http() {
    let h = Harness::new().await;
    let app = router_for(&h);

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/scanner/scan",
        Some(json!({ "code": CARD_1_URL })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], true);

    h.wait_for(|s| s.is_waiting_for_flip).await;
    let (_, body) = make_request(&app, Method::GET, "/scanner/state", None).await;
    assert_eq!(body["phase"], "waiting_for_flip");
    assert_eq!(body["status"]["kind"], "flip_to_play");
    assert_eq!(body["status"]["artist"], "Rudi Carrell");

    // Same code again is a no-op
    let (_, body) = make_request(
        &app,
        Method::POST,
        "/scanner/scan",
        Some(json!({ "code": CARD_1_URL })),
    )
    .await;
    assert_eq!(body["accepted"], false);

    let (_, body) = make_request(&app, Method::POST, "/scanner/flip", None).await;
    assert_eq!(body["accepted"], true);

    h.wait_for(|s| s.is_audio_playing).await;
    let (_, body) = make_request(&app, Method::GET, "/scanner/state", None).await;
    assert_eq!(body["phase"], "now_playing");
    assert_eq!(body["status"]["year"], 1975);
    assert_eq!(body["is_audio_playing"], true);

    let (_, body) = make_request(&app, Method::POST, "/scanner/play_pause", None).await;
    assert_eq!(body["is_audio_playing"], false);

    let (status, body) = make_request(&app, Method::POST, "/scanner/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["status"]["kind"], "point_camera");
    assert!(body["last_scanned_code"].is_null());
}

#[tokio::test]
async fn test_empty_scan_is_rejected() {
    let h = Harness::new().await;
    let app = router_for(&h);

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/scanner/scan",
        Some(json!({ "code": "   " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["status"].as_str().unwrap().starts_with("error"));
    assert_eq!(h.repository.lookups(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let h = Harness::new().await;
    let app = router_for(&h);

    let (status, _) = make_request(
        &app,
        Method::POST,
        "/scanner/mode",
        Some(json!({ "mode": "cassette" })),
    )
    .await;

    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_scan_error_endpoint() {
    let h = Harness::new().await;
    let app = router_for(&h);

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/scanner/scan_error",
        Some(json!({ "error": "Camera unavailable" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["kind"], "scan_error");
    assert_eq!(body["status"]["error"], "Camera unavailable");
    assert_eq!(body["phase"], "idle");
}

#[tokio::test]
async fn test_mode_and_flashlight() {
    let h = Harness::new().await;
    let app = router_for(&h);

    let (_, body) = make_request(
        &app,
        Method::POST,
        "/scanner/mode",
        Some(json!({ "mode": "external" })),
    )
    .await;
    assert_eq!(body["selected_playback_mode"], "external");
    assert_eq!(h.store.raw("use_full_version").as_deref(), Some("true"));

    let (_, body) = make_request(&app, Method::POST, "/scanner/flashlight", None).await;
    assert_eq!(body["flashlight_on"], true);
    let (_, body) = make_request(&app, Method::POST, "/scanner/flashlight", None).await;
    assert_eq!(body["flashlight_on"], false);
}

#[tokio::test]
async fn test_audio_focus_returned_endpoint() {
    let h = Harness::build(HarnessOptions {
        deezer_installed: true,
        full_version: true,
        ..Default::default()
    })
    .await;
    let app = router_for(&h);

    h.scan_until_waiting(CARD_1_URL).await;
    h.session.simulate_flip().await;
    h.wait_for(|s| s.is_audio_playing).await;

    let (_, body) = make_request(&app, Method::POST, "/scanner/audio_focus_returned", None).await;

    assert_eq!(body["is_using_external_playback"], true);
    assert_eq!(body["is_audio_playing"], false);
}

#[tokio::test]
async fn test_sensor_samples_drive_the_flip() {
    let h = Harness::new().await;
    let app = router_for(&h);

    // Nobody listening yet
    let (status, body) = make_request(&app, Method::POST, "/sensor", Some(json!({ "z": -9.81 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], false);

    h.scan_until_waiting(CARD_1_URL).await;

    let (_, body) = make_request(&app, Method::POST, "/sensor", Some(json!({ "z": 0.5 }))).await;
    assert_eq!(body["changed"], false);
    assert_eq!(body["orientation"], "other");

    let (_, body) = make_request(&app, Method::POST, "/sensor", Some(json!({ "z": -9.81 }))).await;
    assert_eq!(body["changed"], true);
    assert_eq!(body["orientation"], "face_down");

    let state = h.wait_for(|s| s.is_now_playing).await;
    assert!(!state.is_waiting_for_flip);
}

#[tokio::test]
async fn test_settings_roundtrip() {
    let h = Harness::new().await;
    let app = router_for(&h);

    let (status, body) = make_request(&app, Method::GET, "/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["release_preview"], false);
    assert_eq!(body["auto_flip_delay_ms"], 3000);

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/settings",
        Some(json!({ "auto_flip_enabled": true, "auto_flip_delay_ms": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["auto_flip_enabled"], true);
    assert_eq!(body["auto_flip_delay_ms"], 500, "delay is clamped");
    assert_eq!(h.store.raw("auto_flip_delay_ms").as_deref(), Some("500"));
}

#[tokio::test]
async fn test_home_endpoints() {
    let h = Harness::new().await;
    let app = router_for(&h);

    let (_, body) = make_request(&app, Method::GET, "/home", None).await;
    assert_eq!(body["service"], "Deezer");
    assert_eq!(body["app_installed"], false);
    assert_eq!(body["test_track_id"], "67238735");

    // App missing: the deep link fails and the web player opens
    let (_, body) = make_request(&app, Method::POST, "/home/test_external", None).await;
    assert_eq!(body["opened"], true);
    assert_eq!(
        h.launcher.opened(),
        vec![
            "deezer://track/67238735".to_string(),
            "https://www.deezer.com/track/67238735".to_string()
        ]
    );

    // No metadata for the test track in the scripted source
    let (_, body) = make_request(&app, Method::POST, "/home/test_preview", None).await;
    assert_eq!(body["mode"], "preview");
    assert_eq!(body["started"], false);

    let (_, body) = make_request(&app, Method::POST, "/home/stop_preview", None).await;
    assert_eq!(body["status"], "stopped");
    assert_eq!(RecordingAudioPlayer::count(&h.audio.stops), 1);
}

#[tokio::test]
async fn test_events_endpoint_is_sse() {
    let h = Harness::new().await;
    let app = router_for(&h);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/events")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));
}
