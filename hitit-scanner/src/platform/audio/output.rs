//! Audio output using cpal
//!
//! A [`ClipOutput`] owns one cpal stream playing one in-memory clip. cpal
//! streams are not `Send`, so a `ClipOutput` lives and dies on the audio
//! thread.

use super::decoder::DecodedAudio;
use super::resampler;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// Playback cursor shared with the real-time callback
struct ClipState {
    samples: Vec<f32>,
    position: usize,
    paused: bool,
}

/// A clip playing on the default output device
pub struct ClipOutput {
    _stream: Stream,
    clip: Arc<Mutex<ClipState>>,
}

impl ClipOutput {
    /// Convert `audio` to the device format and start playing it
    ///
    /// `playing` is cleared by the callback once the clip runs out.
    pub fn start(audio: DecodedAudio, playing: Arc<AtomicBool>) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device".to_string()))?;

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();

        let remixed = resampler::remix(&audio.samples, audio.channels, config.channels);
        let samples = resampler::resample(&remixed, audio.sample_rate, config.sample_rate.0, config.channels)?;

        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            rate = config.sample_rate.0,
            channels = config.channels,
            "Starting preview output"
        );

        let clip = Arc::new(Mutex::new(ClipState {
            samples,
            position: 0,
            paused: false,
        }));

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, Arc::clone(&clip), playing)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, Arc::clone(&clip), playing)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, Arc::clone(&clip), playing)?,
            sample_format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        Ok(Self {
            _stream: stream,
            clip,
        })
    }

    pub fn set_paused(&self, paused: bool) {
        if let Ok(mut clip) = self.clip.lock() {
            clip.paused = paused;
        }
    }

    /// Whether the whole clip has been played
    pub fn finished(&self) -> bool {
        self.clip
            .lock()
            .map(|clip| clip.position >= clip.samples.len())
            .unwrap_or(true)
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    clip: Arc<Mutex<ClipState>>,
    playing: Arc<AtomicBool>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let Ok(mut guard) = clip.try_lock() else {
                    // Control thread holds the lock briefly: emit silence
                    data.fill(T::EQUILIBRIUM);
                    return;
                };
                let state = &mut *guard;

                if state.paused {
                    data.fill(T::EQUILIBRIUM);
                    return;
                }

                let was_playing = state.position < state.samples.len();
                for out in data.iter_mut() {
                    *out = match state.samples.get(state.position) {
                        Some(&sample) => {
                            state.position += 1;
                            T::from_sample(sample.clamp(-1.0, 1.0))
                        }
                        None => T::EQUILIBRIUM,
                    };
                }

                if was_playing && state.position >= state.samples.len() {
                    playing.store(false, Ordering::SeqCst);
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}
