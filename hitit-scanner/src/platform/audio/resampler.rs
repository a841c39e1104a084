//! Sample rate and channel conversion using rubato
//!
//! Decoded clips are converted once, before playback, to the output
//! device's native rate and channel count.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

/// Resample interleaved audio from `input_rate` to `output_rate`
///
/// Returns a copy when the rates already match.
pub fn resample(input: &[f32], input_rate: u32, output_rate: u32, channels: u16) -> Result<Vec<f32>> {
    if input_rate == output_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    debug!(
        "Resampling from {}Hz to {}Hz ({} channels)",
        input_rate, output_rate, channels
    );

    let planar_input = deinterleave(input, channels);
    let input_frames = planar_input.first().map_or(0, Vec::len);
    if input_frames == 0 {
        return Ok(Vec::new());
    }

    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input_frames,
        channels as usize,
    )
    .map_err(|e| Error::AudioDecode(format!("Failed to create resampler: {}", e)))?;

    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| Error::AudioDecode(format!("Resampling failed: {}", e)))?;

    Ok(interleave(planar_output))
}

/// Convert interleaved audio between channel counts
///
/// Mono is duplicated to every output channel; a mono output gets the
/// average of all inputs; otherwise channels map by index and missing ones
/// repeat the last input channel.
pub fn remix(input: &[f32], input_channels: u16, output_channels: u16) -> Vec<f32> {
    let (cin, cout) = (input_channels as usize, output_channels as usize);
    if cin == cout || cin == 0 || cout == 0 {
        return input.to_vec();
    }

    let frames = input.len() / cin;
    let mut output = Vec::with_capacity(frames * cout);
    for frame in input.chunks_exact(cin) {
        if cout == 1 {
            output.push(frame.iter().sum::<f32>() / cin as f32);
        } else {
            for ch in 0..cout {
                output.push(frame[ch.min(cin - 1)]);
            }
        }
    }
    output
}

/// [L, R, L, R, ...] to [[L, L, ...], [R, R, ...]]
fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let num_channels = channels.max(1) as usize;
    let num_frames = samples.len() / num_channels;

    let mut planar = vec![Vec::with_capacity(num_frames); num_channels];
    for frame in samples.chunks_exact(num_channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            planar[ch].push(sample);
        }
    }
    planar
}

/// [[L, L, ...], [R, R, ...]] to [L, R, L, R, ...]
fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
    let num_channels = planar.len();
    let num_frames = planar.first().map_or(0, Vec::len);

    let mut interleaved = Vec::with_capacity(num_frames * num_channels);
    for frame in 0..num_frames {
        for channel in &planar {
            interleaved.push(channel[frame]);
        }
    }
    interleaved
}
