//! Resampling of decoded speech to the rate the output device runs at.

use anyhow::{Context, Result};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{Fft, FixedSync, Resampler};

/// Input frames fed to the FFT resampler per call.
const CHUNK_SIZE: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Number of output frames `input_len` frames map to.
pub fn output_len(input_len: usize, from_rate: u32, to_rate: u32) -> usize {
    (input_len as f64 * to_rate as f64 / from_rate as f64).round() as usize
}

/// Resample a whole mono buffer from one sample rate to another.
///
/// The input is zero padded to whole chunks plus one extra chunk, then the
/// output is cut to exactly [`output_len`] frames with the filter delay removed.
///
/// # Arguments
/// * `samples` - Mono input samples
/// * `from_rate` - Rate the samples were decoded at
/// * `to_rate` - Rate the output stream runs at
///
/// # Returns
/// The resampled buffer, or a copy of the input when the rates match
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = Fft::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        1,
        FixedSync::Input,
    )
    .with_context(|| format!("Failed to create resampler {} -> {} Hz", from_rate, to_rate))?;

    let frames_max = resampler.output_frames_max();
    let mut scratch = vec![0.0f32; frames_max];

    let expected_len = output_len(samples.len(), from_rate, to_rate);
    let mut output = Vec::with_capacity(expected_len + CHUNK_SIZE);

    // One extra zero chunk flushes the resampler's internal delay
    let padded_len = samples.len().div_ceil(CHUNK_SIZE) * CHUNK_SIZE + CHUNK_SIZE;
    let mut input_chunk = vec![0.0f32; CHUNK_SIZE];
    let mut pos = 0;

    while pos < padded_len {
        input_chunk.fill(0.0);
        if pos < samples.len() {
            let end = (pos + CHUNK_SIZE).min(samples.len());
            input_chunk[..end - pos].copy_from_slice(&samples[pos..end]);
        }

        let input = InterleavedSlice::new(&input_chunk, 1, CHUNK_SIZE).context("Invalid resampler input")?;
        let mut out = InterleavedSlice::new_mut(&mut scratch, 1, frames_max).context("Invalid resampler output")?;

        let (_, written) = resampler.process_into_buffer(&input, &mut out, None).map_err(|e| anyhow::anyhow!("Resampling failed: {}", e))?;
        output.extend_from_slice(&scratch[..written]);

        pos += CHUNK_SIZE;
    }

    // Drop the leading delay so audio starts at position zero
    let delay = resampler.output_delay().min(output.len());
    output.drain(..delay);
    output.resize(expected_len, 0.0);

    Ok(output)
}
