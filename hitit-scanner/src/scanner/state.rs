//! Scanner UI state

use hitit_common::events::{PlaybackMode, ScannerPhase};
use serde::Serialize;
use std::fmt;

/// Status line shown under the camera preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusMessage {
    #[default]
    PointCamera,
    Processing,
    /// Camera or decoder failure, passed through verbatim
    ScanError { error: String },
    FetchingTrack { card_id: String },
    FlipToPlay {
        title: Option<String>,
        artist: Option<String>,
    },
    NowPlaying {
        title: Option<String>,
        artist: Option<String>,
        year: Option<i32>,
        album_cover_url: Option<String>,
    },
    CardNotFound { card_id: String },
    SpotifyDetected { track_id: String },
    #[serde(rename = "youtube_detected")]
    YouTubeDetected { video_id: String },
    UrlDetected { url: String },
    UnknownQr { content: String },
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusMessage::PointCamera => write!(f, "Point the camera at a card's QR code"),
            StatusMessage::Processing => write!(f, "Processing..."),
            StatusMessage::ScanError { error } => write!(f, "Scan error: {}", error),
            StatusMessage::FetchingTrack { card_id } => write!(f, "Fetching track for card {}...", card_id),
            StatusMessage::FlipToPlay {
                title: Some(title),
                artist: Some(artist),
            } => write!(f, "Flip your phone to play {} - {}", artist, title),
            StatusMessage::FlipToPlay { .. } => write!(f, "Flip your phone to play"),
            StatusMessage::NowPlaying {
                title: Some(title),
                artist: Some(artist),
                ..
            } => write!(f, "Now playing: {} - {}", artist, title),
            StatusMessage::NowPlaying { .. } => write!(f, "Now playing"),
            StatusMessage::CardNotFound { card_id } => write!(f, "Card {} not found", card_id),
            StatusMessage::SpotifyDetected { track_id } => {
                write!(f, "Spotify track detected ({}), only Deezer is supported", track_id)
            }
            StatusMessage::YouTubeDetected { video_id } => {
                write!(f, "YouTube video detected ({}), only Deezer is supported", video_id)
            }
            StatusMessage::UrlDetected { url } => write!(f, "URL detected: {}", url),
            StatusMessage::UnknownQr { content } => write!(f, "Unknown QR code: {}", content),
        }
    }
}

/// Everything the scanner screen renders
///
/// At most one of `is_processing`, `is_waiting_for_flip` and
/// `is_now_playing` is ever true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ScannerUiState {
    pub is_processing: bool,
    pub status: StatusMessage,
    /// Dedup key: the same code is ignored until reset
    pub last_scanned_code: Option<String>,
    pub flashlight_on: bool,
    pub is_waiting_for_flip: bool,
    pub is_now_playing: bool,
    pub is_audio_playing: bool,
    pub is_using_external_playback: bool,
    pub is_deezer_installed: bool,
    pub selected_playback_mode: PlaybackMode,
}

impl ScannerUiState {
    /// Coarse phase derived from the flags
    pub fn phase(&self) -> ScannerPhase {
        if self.is_now_playing {
            ScannerPhase::NowPlaying
        } else if self.is_waiting_for_flip {
            ScannerPhase::WaitingForFlip
        } else if self.is_processing {
            ScannerPhase::Processing
        } else {
            ScannerPhase::Idle
        }
    }

    /// Whether the one-phase rule holds
    pub fn phase_flags_consistent(&self) -> bool {
        [self.is_processing, self.is_waiting_for_flip, self.is_now_playing]
            .iter()
            .filter(|&&flag| flag)
            .count()
            <= 1
    }

    /// Fresh state that keeps the user's preferences and the app check
    pub fn reset_from(previous: &ScannerUiState) -> Self {
        Self {
            flashlight_on: previous.flashlight_on,
            is_deezer_installed: previous.is_deezer_installed,
            selected_playback_mode: previous.selected_playback_mode,
            ..Self::default()
        }
    }
}
