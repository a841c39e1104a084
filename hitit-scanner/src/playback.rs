//! Track playback dispatch
//!
//! A resolved track is played one of two ways:
//! - **External**: opened in the streaming app through its deep link, with
//!   the web player as fallback. Only used when that mode is selected *and*
//!   the app is installed.
//! - **Preview**: the 30-second clip, fetched through the metadata source and
//!   played by the in-app [`AudioPlayer`].
//!
//! Nothing here retries. A failed attempt is reported in the returned
//! [`PlaybackOutcome`] and the caller decides what to show.

use crate::deezer::TrackMetadataSource;
use crate::platform::{AppLauncher, AudioPlayer};
use async_trait::async_trait;
use hitit_common::events::PlaybackMode;
use hitit_common::{MusicServiceType, Track};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Track used by the home screen to check that playback works
pub const TEST_TRACK_ID: &str = "67238735";

/// Deep links come out as `deezer://track/{id}` (`track` is the URL host).
/// The mobile app builds the empty-host form `deezer:///track/{id}`; both
/// open the track in the Deezer client.
const DEEZER_SCHEME: &str = "deezer://";
const DEEZER_WEB_BASE: &str = "https://www.deezer.com";

/// Streaming service reachable through an external app
#[async_trait]
pub trait MusicService: Send + Sync {
    fn service_type(&self) -> MusicServiceType;

    fn service_name(&self) -> &'static str {
        self.service_type().display_name()
    }

    async fn is_app_installed(&self) -> bool;

    async fn play_track(&self, track: &Track) -> bool {
        self.play_track_by_id(&track.id).await
    }

    /// Open the track in the app, falling back to the web player
    ///
    /// Returns the result of the last attempt.
    async fn play_track_by_id(&self, track_id: &str) -> bool;

    /// Open the track in the web player only
    async fn open_web(&self, track_id: &str) -> bool;

    fn deep_link_url(&self, track_id: &str) -> String;

    fn web_url(&self, track_id: &str) -> String;
}

/// Deezer through the platform launcher
pub struct DeezerMusicService {
    launcher: Arc<dyn AppLauncher>,
}

impl DeezerMusicService {
    pub fn new(launcher: Arc<dyn AppLauncher>) -> Self {
        Self { launcher }
    }
}

#[async_trait]
impl MusicService for DeezerMusicService {
    fn service_type(&self) -> MusicServiceType {
        MusicServiceType::Deezer
    }

    async fn is_app_installed(&self) -> bool {
        self.launcher.can_open_url(DEEZER_SCHEME)
    }

    async fn play_track_by_id(&self, track_id: &str) -> bool {
        let deep_link = self.deep_link_url(track_id);
        if self.launcher.open_url(&deep_link) {
            return true;
        }

        debug!(track_id = %track_id, "Deep link failed, trying web player");
        self.open_web(track_id).await
    }

    async fn open_web(&self, track_id: &str) -> bool {
        self.launcher.open_url(&self.web_url(track_id))
    }

    fn deep_link_url(&self, track_id: &str) -> String {
        format!("{}track/{}", DEEZER_SCHEME, track_id)
    }

    fn web_url(&self, track_id: &str) -> String {
        format!("{}/track/{}", DEEZER_WEB_BASE, track_id)
    }
}

/// One playback attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackRequest {
    pub track_id: String,
    pub mode: PlaybackMode,
    /// Whether the streaming app is installed
    pub app_installed: bool,
    /// Use the app's deep link; `false` opens the web player directly
    pub prefer_deep_link: bool,
    /// Preview URL already known to the caller, saving a metadata lookup
    pub preview_url: Option<String>,
}

impl PlaybackRequest {
    pub fn new(track_id: impl Into<String>, mode: PlaybackMode) -> Self {
        Self {
            track_id: track_id.into(),
            mode,
            app_installed: false,
            prefer_deep_link: true,
            preview_url: None,
        }
    }

    pub fn app_installed(mut self, installed: bool) -> Self {
        self.app_installed = installed;
        self
    }

    pub fn prefer_deep_link(mut self, prefer: bool) -> Self {
        self.prefer_deep_link = prefer;
        self
    }

    pub fn preview_url(mut self, url: Option<String>) -> Self {
        self.preview_url = url;
        self
    }

    /// Whether this request goes to the external app
    pub fn is_external(&self) -> bool {
        self.mode == PlaybackMode::External && self.app_installed
    }
}

/// What a dispatch actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PlaybackOutcome {
    /// The streaming app (or web player) was asked to play the track
    External { opened: bool },
    /// The in-app preview was attempted
    Preview { started: bool },
}

impl PlaybackOutcome {
    pub fn succeeded(&self) -> bool {
        match self {
            PlaybackOutcome::External { opened } => *opened,
            PlaybackOutcome::Preview { started } => *started,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, PlaybackOutcome::External { .. })
    }

    pub fn mode(&self) -> PlaybackMode {
        match self {
            PlaybackOutcome::External { .. } => PlaybackMode::External,
            PlaybackOutcome::Preview { .. } => PlaybackMode::Preview,
        }
    }
}

/// Chooses and issues the playback call
pub struct PlaybackDispatcher {
    music_service: Arc<dyn MusicService>,
    metadata: Arc<dyn TrackMetadataSource>,
    audio: Arc<dyn AudioPlayer>,
}

impl PlaybackDispatcher {
    pub fn new(
        music_service: Arc<dyn MusicService>,
        metadata: Arc<dyn TrackMetadataSource>,
        audio: Arc<dyn AudioPlayer>,
    ) -> Self {
        Self {
            music_service,
            metadata,
            audio,
        }
    }

    pub fn music_service(&self) -> &Arc<dyn MusicService> {
        &self.music_service
    }

    pub fn audio(&self) -> &Arc<dyn AudioPlayer> {
        &self.audio
    }

    pub async fn is_app_installed(&self) -> bool {
        self.music_service.is_app_installed().await
    }

    /// Play a track according to `request`
    pub async fn dispatch(&self, request: PlaybackRequest) -> PlaybackOutcome {
        if request.is_external() {
            let opened = if request.prefer_deep_link {
                self.music_service.play_track_by_id(&request.track_id).await
            } else {
                self.music_service.open_web(&request.track_id).await
            };

            info!(
                track_id = %request.track_id,
                service = self.music_service.service_name(),
                opened,
                "External playback dispatched"
            );
            return PlaybackOutcome::External { opened };
        }

        let preview_url = match request.preview_url {
            Some(url) => Some(url),
            None => self.metadata.preview_url(&request.track_id).await,
        };

        let Some(preview_url) = preview_url else {
            warn!(track_id = %request.track_id, "No preview available");
            return PlaybackOutcome::Preview { started: false };
        };

        let started = self.audio.play(&preview_url).await;
        info!(track_id = %request.track_id, started, "Preview playback dispatched");
        PlaybackOutcome::Preview { started }
    }

    /// Re-open a track in the external app (resume after leaving it)
    pub async fn resume_external(&self, track_id: &str) -> bool {
        self.music_service.play_track_by_id(track_id).await
    }

    pub fn pause_preview(&self) {
        self.audio.pause();
    }

    pub fn resume_preview(&self) {
        self.audio.resume();
    }

    /// Take audio focus back from the external app
    pub fn stop_external(&self) {
        self.audio.stop_external_playback();
    }

    /// Stop in-app audio (idempotent)
    pub fn stop_audio(&self) {
        self.audio.stop();
    }
}
