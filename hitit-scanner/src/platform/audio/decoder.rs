//! Preview clip decoder using symphonia
//!
//! Deezer previews are 30-second MP3 files, decoded fully into memory.

use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Interleaved PCM
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

/// Decode an in-memory MP3 clip to interleaved f32 samples
pub fn decode_mp3(bytes: Vec<u8>) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::AudioDecode(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::AudioDecode("No audio track found".to_string()))?;

    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::AudioDecode(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count() as u16);

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt frame: skip it
                warn!("Decode error: {}", e);
            }
            Err(e) => {
                return Err(Error::AudioDecode(format!("Decoder failed: {}", e)));
            }
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| Error::AudioDecode("Sample rate not found".to_string()))?;
    let channels = channels
        .filter(|&c| c > 0)
        .ok_or_else(|| Error::AudioDecode("Channel count not found".to_string()))?;

    if samples.is_empty() {
        return Err(Error::AudioDecode("Clip contains no audio".to_string()));
    }

    debug!(
        "Decoded {} samples ({} Hz, {} channels)",
        samples.len(),
        sample_rate,
        channels
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}
