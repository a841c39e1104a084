//! Test helpers: recording/scripted collaborators and a session harness

#![allow(dead_code)]

use async_trait::async_trait;
use hitit_common::events::{EventBus, PlaybackMode};
use hitit_common::Card;
use hitit_scanner::deezer::{TrackInfo, TrackMetadataSource};
use hitit_scanner::orientation::{OrientationMonitor, SensorAxis};
use hitit_scanner::platform::{AppLauncher, AudioPlayer, RemoteAccelerometer};
use hitit_scanner::playback::{DeezerMusicService, PlaybackDispatcher};
use hitit_scanner::repository::{CardRepository, StaticCardRepository};
use hitit_scanner::scanner::{ScannerDeps, ScannerSession, ScannerUiState, SessionOptions};
use hitit_scanner::settings::{self, MemorySettingsStore, SettingsService, SettingsStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Face-down reading in m/s² (screen down, gravity along -z)
pub const FACE_DOWN_Z: f32 = -9.81;
pub const FACE_UP_Z: f32 = 9.81;

pub const CARD_1_URL: &str = "https://hitstergame.com/en/00001";
pub const CARD_1_TRACK_ID: &str = "2305104805";
pub const CARD_1_PREVIEW: &str = "https://cdns-preview.example/2305104805.mp3";
pub const CARD_2_URL: &str = "https://hitstergame.com/de/00002";
pub const DEEZER_LINK: &str = "https://www.deezer.com/track/3135556";
pub const DEEZER_LINK_PREVIEW: &str = "https://cdns-preview.example/3135556.mp3";

// ============================================================================
// Launcher
// ============================================================================

/// Records every URL it is asked to open
pub struct RecordingLauncher {
    deezer_installed: bool,
    opened: Mutex<Vec<String>>,
}

impl RecordingLauncher {
    pub fn new(deezer_installed: bool) -> Self {
        Self {
            deezer_installed,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl AppLauncher for RecordingLauncher {
    fn open_url(&self, url: &str) -> bool {
        self.opened.lock().unwrap().push(url.to_string());
        url.starts_with("https://") || (self.deezer_installed && url.starts_with("deezer://"))
    }

    fn can_open_url(&self, scheme: &str) -> bool {
        self.deezer_installed && scheme.starts_with("deezer")
    }
}

// ============================================================================
// Audio player
// ============================================================================

/// Audio player that only counts calls
#[derive(Default)]
pub struct RecordingAudioPlayer {
    played: Mutex<Vec<String>>,
    playing: AtomicBool,
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
    pub stops: AtomicUsize,
    pub external_stops: AtomicUsize,
}

impl RecordingAudioPlayer {
    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioPlayer for RecordingAudioPlayer {
    async fn play(&self, url: &str) -> bool {
        self.played.lock().unwrap().push(url.to_string());
        self.playing.store(true, Ordering::SeqCst);
        true
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        self.playing.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn stop_external_playback(&self) {
        self.external_stops.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Metadata source answering from a fixed table
pub struct ScriptedMetadata {
    tracks: HashMap<String, TrackInfo>,
    calls: AtomicUsize,
    latency: Duration,
}

impl ScriptedMetadata {
    pub fn new(tracks: impl IntoIterator<Item = (&'static str, TrackInfo)>) -> Self {
        Self {
            tracks: tracks
                .into_iter()
                .map(|(id, info)| (id.to_string(), info))
                .collect(),
            calls: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    /// Answer every request after `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Info for the first card's track and for the plain Deezer link
    pub fn standard() -> Self {
        Self::new([
            (
                CARD_1_TRACK_ID,
                TrackInfo {
                    title: Some("Wann wird's mal wieder richtig Sommer".to_string()),
                    artist: Some("Rudi Carrell".to_string()),
                    album_cover_url: Some("https://e-cdns-images.example/cover/250x250.jpg".to_string()),
                    preview_url: Some(CARD_1_PREVIEW.to_string()),
                },
            ),
            (
                "3135556",
                TrackInfo {
                    title: Some("Harder, Better, Faster, Stronger".to_string()),
                    artist: Some("Daft Punk".to_string()),
                    album_cover_url: None,
                    preview_url: Some(DEEZER_LINK_PREVIEW.to_string()),
                },
            ),
        ])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackMetadataSource for ScriptedMetadata {
    async fn track_info(&self, track_id: &str) -> Option<TrackInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.tracks.get(track_id).cloned()
    }
}

// ============================================================================
// Card repository
// ============================================================================

/// Built-in card table with a lookup counter and a configurable delay
pub struct CountingRepository {
    inner: StaticCardRepository,
    lookups: AtomicUsize,
}

impl CountingRepository {
    pub fn builtin(delay: Duration) -> Self {
        Self {
            inner: StaticCardRepository::builtin(delay),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn from_cards(cards: Vec<Card>, delay: Duration) -> Self {
        Self {
            inner: StaticCardRepository::from_cards(cards, delay),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CardRepository for CountingRepository {
    async fn get_card_by_id(&self, card_id: &str) -> Option<Card> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_card_by_id(card_id).await
    }

    fn card_count(&self) -> Option<usize> {
        Some(self.inner.len())
    }
}

// ============================================================================
// Session harness
// ============================================================================

/// Knobs for [`Harness::build`]
pub struct HarnessOptions {
    pub deezer_installed: bool,
    pub full_version: bool,
    pub use_deep_link: bool,
    pub auto_flip: bool,
    pub auto_flip_delay_ms: u64,
    pub release_preview: bool,
    pub flash_enabled: bool,
    pub lookup_delay: Duration,
    pub flip_arm_delay: Duration,
    pub metadata_latency: Duration,
    pub repository: Option<CountingRepository>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            deezer_installed: false,
            full_version: false,
            use_deep_link: true,
            auto_flip: false,
            auto_flip_delay_ms: settings::DEFAULT_AUTO_FLIP_DELAY_MS,
            release_preview: false,
            flash_enabled: false,
            lookup_delay: Duration::ZERO,
            flip_arm_delay: Duration::ZERO,
            metadata_latency: Duration::ZERO,
            repository: None,
        }
    }
}

/// A scanner session wired to fakes
pub struct Harness {
    pub session: Arc<ScannerSession>,
    pub settings: Arc<SettingsService>,
    pub store: Arc<MemorySettingsStore>,
    pub launcher: Arc<RecordingLauncher>,
    pub audio: Arc<RecordingAudioPlayer>,
    pub metadata: Arc<ScriptedMetadata>,
    pub repository: Arc<CountingRepository>,
    pub sensor: Arc<RemoteAccelerometer>,
    pub monitor: Arc<OrientationMonitor>,
    pub dispatcher: Arc<PlaybackDispatcher>,
    pub events: EventBus,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(HarnessOptions::default()).await
    }

    pub async fn build(options: HarnessOptions) -> Self {
        let events = EventBus::default();

        let store = Arc::new(MemorySettingsStore::new());
        store.set_bool(settings::AUTO_FLIP_ENABLED, options.auto_flip).await.unwrap();
        store
            .set_i64(settings::AUTO_FLIP_DELAY_MS, options.auto_flip_delay_ms as i64)
            .await
            .unwrap();
        store.set_bool(settings::USE_DEEZER_DEEPLINK, options.use_deep_link).await.unwrap();
        store.set_bool(settings::USE_FULL_VERSION, options.full_version).await.unwrap();
        store.set_bool(settings::FLASH_ENABLED, options.flash_enabled).await.unwrap();

        let settings = Arc::new(
            SettingsService::load(store.clone(), options.release_preview, events.clone()).await,
        );

        let launcher = Arc::new(RecordingLauncher::new(options.deezer_installed));
        let audio = Arc::new(RecordingAudioPlayer::default());
        let metadata = Arc::new(ScriptedMetadata::standard().with_latency(options.metadata_latency));
        let repository = Arc::new(
            options
                .repository
                .unwrap_or_else(|| CountingRepository::builtin(options.lookup_delay)),
        );

        let dispatcher = Arc::new(PlaybackDispatcher::new(
            Arc::new(DeezerMusicService::new(launcher.clone())),
            metadata.clone(),
            audio.clone(),
        ));

        let sensor = Arc::new(RemoteAccelerometer::new());
        let monitor = Arc::new(OrientationMonitor::new(
            sensor.clone(),
            SensorAxis::default(),
            events.clone(),
        ));

        let session = Arc::new(
            ScannerSession::new(
                ScannerDeps {
                    repository: repository.clone(),
                    metadata: metadata.clone(),
                    dispatcher: dispatcher.clone(),
                    monitor: monitor.clone(),
                },
                settings.clone(),
                events.clone(),
                SessionOptions {
                    flip_arm_delay: options.flip_arm_delay,
                },
            )
            .await,
        );

        Self {
            session,
            settings,
            store,
            launcher,
            audio,
            metadata,
            repository,
            sensor,
            monitor,
            dispatcher,
            events,
        }
    }

    /// Wait until the published state satisfies `predicate`
    pub async fn wait_for(&self, predicate: impl Fn(&ScannerUiState) -> bool) -> ScannerUiState {
        wait_for_state(&self.session, predicate).await
    }

    /// Scan `code` and wait for the flip prompt
    pub async fn scan_until_waiting(&self, code: &str) -> ScannerUiState {
        assert!(self.session.on_qr_code_scanned(code).await, "scan of {} was ignored", code);
        self.wait_for(|s| s.is_waiting_for_flip).await
    }

    pub fn selected_mode_persisted(&self) -> Option<PlaybackMode> {
        self.store
            .raw(settings::USE_FULL_VERSION)
            .map(|v| if v == "true" { PlaybackMode::External } else { PlaybackMode::Preview })
    }
}

/// Wait (up to a minute of runtime time) for a matching published state
pub async fn wait_for_state(
    session: &ScannerSession,
    predicate: impl Fn(&ScannerUiState) -> bool,
) -> ScannerUiState {
    let mut rx = session.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|state| predicate(state)))
        .await
        .expect("timed out waiting for scanner state")
        .expect("scanner state channel closed")
        .clone();
    state
}

/// Let spawned tasks run without moving the clock much
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
