//! Desktop preview player
//!
//! Downloads a preview clip, decodes it and plays it on the default output
//! device. A dedicated audio thread owns the cpal stream; the async side
//! sends it commands over a channel.

pub mod decoder;
pub mod output;
pub mod resampler;

use super::AudioPlayer;
use crate::error::{Error, Result};
use async_trait::async_trait;
use decoder::DecodedAudio;
use output::ClipOutput;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

enum AudioCommand {
    Play {
        audio: DecodedAudio,
        generation: u64,
        reply: oneshot::Sender<Result<bool>>,
    },
    Pause,
    Resume,
    Stop,
}

/// In-app player for 30-second preview clips
pub struct PreviewPlayer {
    http_client: reqwest::Client,
    commands: mpsc::UnboundedSender<AudioCommand>,
    playing: Arc<AtomicBool>,
    /// Bumped by every play/stop; a load that finishes under an older
    /// generation is discarded
    generation: Arc<AtomicU64>,
}

impl PreviewPlayer {
    /// Spawn the audio thread
    pub fn new() -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let playing = Arc::new(AtomicBool::new(false));
        let generation = Arc::new(AtomicU64::new(0));

        {
            let playing = Arc::clone(&playing);
            let generation = Arc::clone(&generation);
            std::thread::Builder::new()
                .name("hitit-audio".to_string())
                .spawn(move || run_audio_thread(rx, playing, generation))?;
        }

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("HitIt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            commands: tx,
            playing,
            generation,
        })
    }

    fn send(&self, command: AudioCommand) {
        if self.commands.send(command).is_err() {
            warn!("Audio thread is gone, command dropped");
        }
    }

    async fn load_and_play(&self, url: &str, generation: u64) -> Result<bool> {
        let bytes = self
            .http_client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::Network(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| Error::Network(e.to_string()))?
            .to_vec();

        debug!(bytes = bytes.len(), "Preview downloaded");

        let audio = tokio::task::spawn_blocking(move || decoder::decode_mp3(bytes))
            .await
            .map_err(|e| Error::Internal(format!("Decode task failed: {}", e)))??;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Preview superseded before playback");
            return Ok(false);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(AudioCommand::Play {
                audio,
                generation,
                reply: reply_tx,
            })
            .map_err(|_| Error::AudioOutput("Audio thread is gone".to_string()))?;

        reply_rx
            .await
            .map_err(|_| Error::AudioOutput("Audio thread dropped the request".to_string()))?
    }
}

#[async_trait]
impl AudioPlayer for PreviewPlayer {
    async fn play(&self, url: &str) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.send(AudioCommand::Stop);

        match self.load_and_play(url, generation).await {
            Ok(started) => {
                if started {
                    info!(url = %url, "Preview playing");
                }
                started
            }
            Err(e) => {
                warn!(url = %url, "Preview playback failed: {}", e);
                false
            }
        }
    }

    fn pause(&self) {
        self.send(AudioCommand::Pause);
    }

    fn resume(&self) {
        self.send(AudioCommand::Resume);
    }

    fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.send(AudioCommand::Stop);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn stop_external_playback(&self) {
        // No audio focus to take on a desktop
        debug!("stop_external_playback has no effect on desktop");
    }
}

impl Drop for PreviewPlayer {
    fn drop(&mut self) {
        self.send(AudioCommand::Stop);
    }
}

/// Audio thread loop; exits when every sender is dropped
fn run_audio_thread(
    mut commands: mpsc::UnboundedReceiver<AudioCommand>,
    playing: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
) {
    let mut current: Option<ClipOutput> = None;

    while let Some(command) = commands.blocking_recv() {
        match command {
            AudioCommand::Play {
                audio,
                generation: requested,
                reply,
            } => {
                current = None;
                if generation.load(Ordering::SeqCst) != requested {
                    let _ = reply.send(Ok(false));
                    continue;
                }

                playing.store(true, Ordering::SeqCst);
                match ClipOutput::start(audio, Arc::clone(&playing)) {
                    Ok(clip) => {
                        current = Some(clip);
                        let _ = reply.send(Ok(true));
                    }
                    Err(e) => {
                        playing.store(false, Ordering::SeqCst);
                        let _ = reply.send(Err(e));
                    }
                }
            }
            AudioCommand::Pause => {
                if let Some(clip) = &current {
                    clip.set_paused(true);
                    playing.store(false, Ordering::SeqCst);
                }
            }
            AudioCommand::Resume => {
                if let Some(clip) = current.as_ref().filter(|clip| !clip.finished()) {
                    clip.set_paused(false);
                    playing.store(true, Ordering::SeqCst);
                }
            }
            AudioCommand::Stop => {
                current = None;
                playing.store(false, Ordering::SeqCst);
            }
        }
    }

    debug!("Audio thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_idle_player_controls_are_harmless() {
        let player = PreviewPlayer::new().unwrap();

        player.pause();
        player.resume();
        player.stop();
        player.stop();
        player.stop_external_playback();

        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn test_unreachable_url_does_not_start() {
        let player = PreviewPlayer::new().unwrap();

        // Port 9 (discard) on loopback: connection refused
        let started = player.play("http://127.0.0.1:9/preview.mp3").await;

        assert!(!started);
        assert!(!player.is_playing());
    }
}
