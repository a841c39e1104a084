//! Scan orchestration
//!
//! One [`ScannerSession`] drives one scanner screen:
//!
//! ```text
//! Idle --scan--> Processing --resolved--> WaitingForFlip --flip--> NowPlaying
//!                    |                                                 |
//!                    +--not found / not playable--> Idle <--reset------+
//! ```
//!
//! All state lives in one `RwLock`. Every mutation happens in a single
//! critical section that also publishes the new snapshot, so observers never
//! see two phase flags set at once. Background work (lookups, the flip race,
//! playback) runs in tracked tasks. `reset()` clears the state and bumps a
//! generation counter in one write, then aborts and awaits those tasks.
//! Writes and spawns from an older generation are dropped.

use super::state::{ScannerUiState, StatusMessage};
use crate::deezer::{TrackInfo, TrackMetadataSource};
use crate::orientation::OrientationMonitor;
use crate::playback::{PlaybackDispatcher, PlaybackOutcome, PlaybackRequest};
use crate::repository::CardRepository;
use crate::settings::SettingsService;
use hitit_common::events::{DeviceOrientation, EventBus, HitItEvent, PlaybackMode, ScannerPhase};
use hitit_common::{classify, ScanResult, Track};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Collaborators of a session
#[derive(Clone)]
pub struct ScannerDeps {
    pub repository: Arc<dyn CardRepository>,
    pub metadata: Arc<dyn TrackMetadataSource>,
    pub dispatcher: Arc<PlaybackDispatcher>,
    pub monitor: Arc<OrientationMonitor>,
}

/// Timing knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Sensor events are ignored for this long after the flip prompt appears
    ///
    /// Defaults to 500 ms so a phone already lying face down does not flip
    /// the moment the prompt shows. A face-down reading inside that window
    /// is acted on when the window ends, not when it arrives: with the
    /// default, a flip at 100 ms triggers at 500 ms. Set it to zero for the
    /// sensor to count from the first sample.
    pub flip_arm_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            flip_arm_delay: Duration::from_millis(500),
        }
    }
}

/// What ended the flip wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipTrigger {
    Sensor,
    AutoTimer,
    Manual,
}

struct SessionData {
    ui: ScannerUiState,
    pending_track: Option<Track>,
    pending_track_id: Option<String>,
    generation: u64,
}

struct Inner {
    id: Uuid,
    deps: ScannerDeps,
    settings: Arc<SettingsService>,
    events: EventBus,
    options: SessionOptions,
    data: RwLock<SessionData>,
    state_tx: watch::Sender<ScannerUiState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Cancelled on reset; the flip race listens on a child of it
    epoch: Mutex<CancellationToken>,
    flip_wait: Mutex<Option<CancellationToken>>,
}

/// Scanner screen state machine
pub struct ScannerSession {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScannerSession {
    /// Create a session in `Idle`
    ///
    /// Restores the persisted playback mode, forces the flashlight off (and
    /// persists that), then asks whether the streaming app is installed.
    pub async fn new(
        deps: ScannerDeps,
        settings: Arc<SettingsService>,
        events: EventBus,
        options: SessionOptions,
    ) -> Self {
        let selected_playback_mode = if settings.use_full_version().await {
            PlaybackMode::External
        } else {
            PlaybackMode::Preview
        };

        if let Err(e) = settings.set_flash_enabled(false).await {
            warn!("Failed to persist flashlight state: {}", e);
        }

        let is_deezer_installed = deps.dispatcher.is_app_installed().await;

        let ui = ScannerUiState {
            selected_playback_mode,
            is_deezer_installed,
            flashlight_on: false,
            ..Default::default()
        };
        let (state_tx, _) = watch::channel(ui.clone());

        let inner = Arc::new(Inner {
            id: Uuid::new_v4(),
            deps,
            settings,
            events,
            options,
            data: RwLock::new(SessionData {
                ui,
                pending_track: None,
                pending_track_id: None,
                generation: 0,
            }),
            state_tx,
            tasks: Mutex::new(Vec::new()),
            epoch: Mutex::new(CancellationToken::new()),
            flip_wait: Mutex::new(None),
        });

        info!(
            session_id = %inner.id,
            mode = ?selected_playback_mode,
            deezer_installed = is_deezer_installed,
            "Scanner session created"
        );

        Self { inner }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Snapshot of the current state
    pub async fn state(&self) -> ScannerUiState {
        self.inner.data.read().await.ui.clone()
    }

    pub async fn phase(&self) -> ScannerPhase {
        self.inner.data.read().await.ui.phase()
    }

    /// Every published state, latest first
    pub fn subscribe(&self) -> watch::Receiver<ScannerUiState> {
        self.inner.state_tx.subscribe()
    }

    /// Handle a decoded QR code
    ///
    /// Ignored unless the session is idle, and ignored when `code` equals the
    /// last scanned code (the camera reports the same code every frame).
    /// Returns whether the code was accepted.
    pub async fn on_qr_code_scanned(&self, code: &str) -> bool {
        let accepted = self
            .inner
            .update(None, |data| {
                if data.ui.phase() != ScannerPhase::Idle
                    || data.ui.last_scanned_code.as_deref() == Some(code)
                {
                    return None;
                }
                data.ui.is_processing = true;
                data.ui.last_scanned_code = Some(code.to_string());
                data.ui.status = StatusMessage::Processing;
                Some(data.generation)
            })
            .await
            .flatten();

        let Some(generation) = accepted else {
            debug!("Scan ignored");
            return false;
        };

        info!(session_id = %self.inner.id, code = %code, "QR code scanned");
        let inner = Arc::clone(&self.inner);
        let code = code.to_string();
        self.inner
            .spawn_for_generation(generation, async move {
                inner.handle_scanned_code(code, generation).await
            })
            .await
    }

    /// Show a camera/decoder error
    pub async fn on_scan_error(&self, error: &str) {
        let error = error.to_string();
        self.inner
            .update(None, |data| data.ui.status = StatusMessage::ScanError { error })
            .await;
    }

    /// Face-down reported outside the flip race (e.g. by a front end that
    /// classifies orientation itself)
    pub async fn on_device_flipped_face_down(&self) -> bool {
        self.inner.flip(FlipTrigger::Sensor, None).await
    }

    /// Act as if the device had been flipped
    pub async fn simulate_flip(&self) -> bool {
        self.inner.flip(FlipTrigger::Manual, None).await
    }

    /// Pause/resume whatever is playing
    pub async fn toggle_play_pause(&self) {
        let (external, playing, track_id) = {
            let data = self.inner.data.read().await;
            let track_id = data
                .pending_track
                .as_ref()
                .map(|track| track.id.clone())
                .or_else(|| data.pending_track_id.clone());
            (data.ui.is_using_external_playback, data.ui.is_audio_playing, track_id)
        };
        let dispatcher = &self.inner.deps.dispatcher;

        if external {
            if playing {
                dispatcher.stop_external();
                self.inner.update(None, |data| data.ui.is_audio_playing = false).await;
            } else if let Some(track_id) = track_id {
                let reopen_dispatcher = Arc::clone(dispatcher);
                self.inner.spawn_tracked(async move {
                    reopen_dispatcher.resume_external(&track_id).await;
                });
                self.inner.update(None, |data| data.ui.is_audio_playing = true).await;
            }
        } else if playing {
            dispatcher.pause_preview();
            self.inner.update(None, |data| data.ui.is_audio_playing = false).await;
        } else {
            dispatcher.resume_preview();
            self.inner.update(None, |data| data.ui.is_audio_playing = true).await;
        }
    }

    /// The user came back from the streaming app, which stops its playback
    pub async fn on_audio_focus_returned(&self) {
        self.inner
            .update(None, |data| {
                if data.ui.is_using_external_playback && data.ui.is_audio_playing {
                    data.ui.is_audio_playing = false;
                }
            })
            .await;
    }

    /// Select and persist the playback mode
    pub async fn set_playback_mode(&self, mode: PlaybackMode) {
        self.inner
            .update(None, |data| data.ui.selected_playback_mode = mode)
            .await;

        if let Err(e) = self
            .inner
            .settings
            .set_use_full_version(mode == PlaybackMode::External)
            .await
        {
            warn!("Failed to persist playback mode: {}", e);
        }
    }

    /// Toggle and persist the flashlight; returns the new state
    pub async fn toggle_flashlight(&self) -> bool {
        let on = self
            .inner
            .update(None, |data| {
                data.ui.flashlight_on = !data.ui.flashlight_on;
                data.ui.flashlight_on
            })
            .await
            .unwrap_or(false);

        if let Err(e) = self.inner.settings.set_flash_enabled(on).await {
            warn!("Failed to persist flashlight state: {}", e);
        }
        on
    }

    /// Back to `Idle` from any state
    ///
    /// Cancels background work, stops orientation monitoring and audio,
    /// forgets the pending track and the dedup key. Keeps the flashlight,
    /// the app check and the playback mode. Safe to call repeatedly.
    pub async fn reset(&self) {
        self.inner.reset().await;
    }

    /// Reset and release everything; for session teardown
    pub async fn shutdown(&self) {
        self.inner.reset().await;
        self.inner.deps.dispatcher.stop_audio();
        self.inner.deps.monitor.stop();
        info!(session_id = %self.inner.id, "Scanner session shut down");
    }

    /// Background tasks still running
    pub fn active_tasks(&self) -> usize {
        let mut tasks = lock(&self.inner.tasks);
        tasks.retain(|handle| !handle.is_finished());
        tasks.len()
    }
}

impl Inner {
    /// Apply `f` to the state and publish the result if anything changed
    ///
    /// With `generation` set, the update is skipped (returning `None`) when
    /// a reset happened since that generation was captured.
    async fn update<R>(
        &self,
        generation: Option<u64>,
        f: impl FnOnce(&mut SessionData) -> R,
    ) -> Option<R> {
        let mut data = self.data.write().await;
        if generation.is_some_and(|g| g != data.generation) {
            debug!("Dropping update from a previous scan");
            return None;
        }

        let before = data.ui.clone();
        let result = f(&mut data);
        debug_assert!(data.ui.phase_flags_consistent(), "phase flags: {:?}", data.ui);

        if data.ui != before {
            self.publish(&data.ui, before.phase() != data.ui.phase() || before.status != data.ui.status);
        }
        Some(result)
    }

    fn publish(&self, ui: &ScannerUiState, announce: bool) {
        self.state_tx.send_replace(ui.clone());
        if announce {
            self.events.emit(HitItEvent::ScannerStateChanged {
                session_id: self.id,
                phase: ui.phase(),
                status_text: ui.status.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
    }

    fn spawn_tracked<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(work);
        let mut tasks = lock(&self.tasks);
        tasks.retain(|handle| !handle.is_finished());
        tasks.push(handle);
    }

    /// Spawn `work` unless a reset happened since `generation`
    ///
    /// The read lock is held while the task is registered, so `reset()`
    /// either drains the handle or the spawn is skipped.
    async fn spawn_for_generation<F>(&self, generation: u64, work: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let data = self.data.read().await;
        if data.generation != generation {
            debug!("Not spawning work for a previous scan");
            return false;
        }
        self.spawn_tracked(work);
        true
    }

    async fn handle_scanned_code(self: Arc<Self>, code: String, generation: u64) {
        let status = match classify(&code) {
            ScanResult::Card { card_id } => {
                self.handle_card(card_id, generation).await;
                return;
            }
            ScanResult::DeezerTrack { track_id } => {
                let armed = self
                    .update(Some(generation), |data| {
                        data.pending_track_id = Some(track_id);
                        data.ui.status = StatusMessage::FlipToPlay {
                            title: None,
                            artist: None,
                        };
                        data.ui.is_processing = false;
                        data.ui.is_waiting_for_flip = true;
                    })
                    .await
                    .is_some();
                if armed {
                    self.arm_flip_wait(generation).await;
                }
                return;
            }
            ScanResult::SpotifyTrack { track_id } => StatusMessage::SpotifyDetected { track_id },
            ScanResult::YouTubeVideo { video_id } => StatusMessage::YouTubeDetected { video_id },
            ScanResult::GenericUrl { url } => StatusMessage::UrlDetected { url },
            ScanResult::Unknown { raw } => StatusMessage::UnknownQr { content: raw },
        };

        self.finish_scan(generation, status).await;
    }

    async fn handle_card(self: &Arc<Self>, card_id: String, generation: u64) {
        let fetching = StatusMessage::FetchingTrack {
            card_id: card_id.clone(),
        };
        if self
            .update(Some(generation), |data| data.ui.status = fetching)
            .await
            .is_none()
        {
            return;
        }

        let card = self.deps.repository.get_card_by_id(&card_id).await;
        let Some(track) = card.as_ref().and_then(|card| card.to_track()) else {
            info!(card_id = %card_id, found = card.is_some(), "Card has no playable track");
            self.finish_scan(generation, StatusMessage::CardNotFound { card_id }).await;
            return;
        };

        info!(
            card_id = %card_id,
            track_id = %track.id,
            title = %track.title.as_deref().unwrap_or(""),
            "Card resolved"
        );

        let armed = self
            .update(Some(generation), |data| {
                data.ui.status = StatusMessage::FlipToPlay {
                    title: track.title.clone(),
                    artist: track.artist.clone(),
                };
                data.pending_track = Some(track);
                data.ui.is_processing = false;
                data.ui.is_waiting_for_flip = true;
            })
            .await
            .is_some();

        if armed {
            self.arm_flip_wait(generation).await;
        }
    }

    /// End a scan attempt in `Idle` with `status`
    async fn finish_scan(&self, generation: u64, status: StatusMessage) {
        self.update(Some(generation), |data| {
            data.ui.status = status;
            data.ui.is_processing = false;
        })
        .await;
    }

    /// Start the orientation monitor and race it against the auto-flip timer
    async fn arm_flip_wait(self: &Arc<Self>, generation: u64) {
        let auto_flip = if self.settings.auto_flip_enabled().await {
            Some(self.settings.auto_flip_delay().await)
        } else {
            None
        };

        // Held until the race task is registered; see spawn_for_generation
        let data = self.data.read().await;
        if data.generation != generation {
            debug!("Flip wait abandoned by reset");
            return;
        }

        self.deps.monitor.start();
        let cancel = lock(&self.epoch).child_token();
        if let Some(previous) = lock(&self.flip_wait).replace(cancel.clone()) {
            previous.cancel();
        }

        debug!(?auto_flip, arm_delay = ?self.options.flip_arm_delay, "Waiting for flip");

        let inner = Arc::clone(self);
        let monitor = Arc::clone(&self.deps.monitor);
        let arm_delay = self.options.flip_arm_delay;

        self.spawn_tracked(async move {
            let sensor = async {
                if !arm_delay.is_zero() {
                    tokio::time::sleep(arm_delay).await;
                }
                monitor.wait_for(DeviceOrientation::FaceDown).await;
            };
            let timer = async {
                match auto_flip {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let trigger = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = sensor => FlipTrigger::Sensor,
                _ = timer => FlipTrigger::AutoTimer,
            };

            inner.flip(trigger, Some(generation)).await;
        });
        drop(data);
    }

    /// WaitingForFlip -> NowPlaying, then start playback in the background
    async fn flip(self: &Arc<Self>, trigger: FlipTrigger, generation: Option<u64>) -> bool {
        let pending = self
            .update(generation, |data| {
                if !data.ui.is_waiting_for_flip {
                    return None;
                }
                data.ui.is_waiting_for_flip = false;
                data.ui.is_now_playing = true;
                Some((
                    data.pending_track.clone(),
                    data.pending_track_id.clone(),
                    data.generation,
                ))
            })
            .await
            .flatten();

        let Some((track, track_id, generation)) = pending else {
            debug!(?trigger, "Flip ignored, not waiting for one");
            return false;
        };

        if let Some(wait) = lock(&self.flip_wait).take() {
            wait.cancel();
        }
        self.deps.monitor.stop();

        info!(session_id = %self.id, ?trigger, "Flip detected");

        let inner = Arc::clone(self);
        self.spawn_for_generation(generation, async move {
            inner.start_playback(track, track_id, generation).await
        })
        .await
    }

    async fn start_playback(&self, track: Option<Track>, track_id: Option<String>, generation: u64) {
        if let Some(track) = track {
            let info = self.deps.metadata.track_info(&track.id).await;
            let status = StatusMessage::NowPlaying {
                title: track.title.clone(),
                artist: track.artist.clone(),
                year: track.year,
                album_cover_url: info.as_ref().and_then(|i| i.album_cover_url.clone()),
            };
            if self
                .update(Some(generation), |data| data.ui.status = status)
                .await
                .is_none()
            {
                return;
            }
            self.play(&track.id, info, generation).await;
            return;
        }

        let Some(track_id) = track_id else {
            return;
        };

        match self.deps.metadata.track_info(&track_id).await {
            Some(info) => {
                let status = StatusMessage::NowPlaying {
                    title: info.title.clone(),
                    artist: info.artist.clone(),
                    year: None,
                    album_cover_url: info.album_cover_url.clone(),
                };
                if self
                    .update(Some(generation), |data| data.ui.status = status)
                    .await
                    .is_some()
                {
                    self.play(&track_id, Some(info), generation).await;
                }
            }
            None => {
                self.update(Some(generation), |data| {
                    data.ui.status = StatusMessage::NowPlaying {
                        title: None,
                        artist: None,
                        year: None,
                        album_cover_url: None,
                    }
                })
                .await;
            }
        }
    }

    /// Dispatch playback once, with whatever metadata the flip lookup found
    async fn play(&self, track_id: &str, info: Option<TrackInfo>, generation: u64) {
        let (mode, installed) = {
            let data = self.data.read().await;
            (data.ui.selected_playback_mode, data.ui.is_deezer_installed)
        };

        let request = PlaybackRequest::new(track_id, mode)
            .app_installed(installed)
            .prefer_deep_link(self.settings.use_deezer_deeplink().await)
            .preview_url(info.and_then(|i| i.preview_url));

        if !request.is_external() && request.preview_url.is_none() {
            warn!(track_id = %track_id, "No preview to play");
            return;
        }

        let outcome = self.deps.dispatcher.dispatch(request).await;

        let recorded = self
            .update(Some(generation), |data| {
                data.ui.is_using_external_playback = outcome.is_external();
                data.ui.is_audio_playing = outcome.succeeded();
            })
            .await
            .is_some();

        if recorded {
            self.events.emit(HitItEvent::PlaybackStarted {
                session_id: self.id,
                track_id: track_id.to_string(),
                mode: outcome.mode(),
                started: outcome.succeeded(),
                timestamp: chrono::Utc::now(),
            });
        }

        if let PlaybackOutcome::External { opened: false } = outcome {
            warn!(track_id = %track_id, "Streaming app could not be opened");
        }
    }

    async fn reset(&self) {
        // Back to Idle and invalidate in-flight work in one write, so a flip
        // racing this call finds nothing to flip
        self.update(None, |data| {
            data.generation += 1;
            data.pending_track = None;
            data.pending_track_id = None;
            data.ui = ScannerUiState::reset_from(&data.ui);
        })
        .await;

        let stale_epoch = std::mem::replace(&mut *lock(&self.epoch), CancellationToken::new());
        stale_epoch.cancel();
        lock(&self.flip_wait).take();

        let handles: Vec<JoinHandle<()>> = lock(&self.tasks).drain(..).collect();
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            // Cancelled tasks report a JoinError; that is the expected outcome
            let _ = handle.await;
        }

        self.deps.monitor.stop();
        self.deps.dispatcher.stop_audio();

        debug!(session_id = %self.id, "Scanner reset");
    }
}
