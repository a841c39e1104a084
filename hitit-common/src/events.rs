//! Event types for the HitIt event system
//!
//! Events are broadcast inside a service and serialized for SSE transmission
//! to connected front ends.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Coarse phase of a scanner session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScannerPhase {
    /// Camera is pointed, waiting for a code
    #[default]
    Idle,
    /// A code was scanned and is being resolved
    Processing,
    /// Track resolved, waiting for the device to be flipped face down
    WaitingForFlip,
    /// Flip detected, playback initiated
    NowPlaying,
}

/// Classified device pose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOrientation {
    /// Screen facing up
    FaceUp,
    /// Screen facing down
    FaceDown,
    /// Anything in between
    #[default]
    Other,
}

/// How a resolved track is played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// 30-second preview played in-app
    #[default]
    Preview,
    /// Full track opened in the external streaming app
    External,
}

/// HitIt event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HitItEvent {
    /// Scanner session state changed
    ScannerStateChanged {
        session_id: Uuid,
        phase: ScannerPhase,
        /// Human-readable status line
        status_text: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Device pose changed (only changes are reported)
    OrientationChanged {
        orientation: DeviceOrientation,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback was dispatched for a resolved track
    PlaybackStarted {
        session_id: Uuid,
        track_id: String,
        mode: PlaybackMode,
        /// Whether the external app opened or the preview started
        started: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A persisted setting was written
    SettingsChanged {
        key: String,
        value: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl HitItEvent {
    /// Event type name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            HitItEvent::ScannerStateChanged { .. } => "ScannerStateChanged",
            HitItEvent::OrientationChanged { .. } => "OrientationChanged",
            HitItEvent::PlaybackStarted { .. } => "PlaybackStarted",
            HitItEvent::SettingsChanged { .. } => "SettingsChanged",
        }
    }
}

/// Broadcast bus for [`HitItEvent`]s
///
/// Cloning the bus shares the underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HitItEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per lagging subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn emit(&self, event: HitItEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HitItEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
