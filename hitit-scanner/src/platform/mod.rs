//! Platform collaborators
//!
//! The scanner talks to the device only through these traits. Each target
//! supplies its own implementations, chosen once in `main.rs`; this crate
//! ships the desktop/host ones.

pub mod audio;
pub mod launcher;
pub mod sensor;

use crate::orientation::SampleSink;
use async_trait::async_trait;

pub use audio::PreviewPlayer;
pub use launcher::DesktopLauncher;
pub use sensor::RemoteAccelerometer;

/// Opens URLs in other applications
///
/// Failures are reported as `false`, never as errors.
pub trait AppLauncher: Send + Sync {
    /// Hand `url` to whatever application handles it
    fn open_url(&self, url: &str) -> bool;

    /// Whether some installed application handles `scheme` (`"deezer://"` or `"deezer"`)
    fn can_open_url(&self, scheme: &str) -> bool;
}

/// In-app audio playback of preview clips
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Start playing `url`, replacing anything already playing
    ///
    /// Resolves once playback has started (true) or failed (false).
    async fn play(&self, url: &str) -> bool;

    fn pause(&self);

    fn resume(&self);

    /// Stop and release the current clip. Safe to call when idle.
    fn stop(&self);

    fn is_playing(&self) -> bool;

    /// Ask the OS to take audio focus from an external player
    fn stop_external_playback(&self);
}

/// Raw gravity-axis samples
///
/// Implementations push every reading into the sink between `start` and
/// `stop`; they may call it from any thread.
pub trait AccelerometerSource: Send + Sync {
    fn start(&self, sink: SampleSink);

    fn stop(&self);
}
