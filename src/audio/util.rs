//! Shared audio helpers for decoding and playback.

use anyhow::Result;
use cpal::traits::DeviceTrait;
use cpal::{Device, SampleFormat, SupportedStreamConfig, SupportedStreamConfigRange};

/// Output device name for logs.
pub fn get_device_name(device: &Device) -> String {
    match device.description() {
        Ok(desc) => desc.name().to_string(),
        Err(_) => "Unknown".to_string(),
    }
}

/// Pick an `f32` output configuration with at most two channels.
///
/// A range containing `target_sample_rate` wins; otherwise the range whose
/// nearest bound is closest to it is used at that bound.
///
/// # Arguments
/// * `configs` - Ranges reported by `supported_output_configs`
/// * `target_sample_rate` - Preferred rate, usually the device default
///
/// # Errors
/// Returns an error if no range has `f32` samples and one or two channels.
pub fn find_best_config(configs: impl Iterator<Item = SupportedStreamConfigRange>, target_sample_rate: u32) -> Result<SupportedStreamConfig> {
    let usable: Vec<SupportedStreamConfigRange> = configs.filter(|c| c.channels() <= 2 && c.sample_format() == SampleFormat::F32).collect();

    if let Some(exact) = usable.iter().find(|c| (c.min_sample_rate()..=c.max_sample_rate()).contains(&target_sample_rate)) {
        return Ok((*exact).with_sample_rate(target_sample_rate));
    }

    usable
        .iter()
        .map(|c| {
            let rate = target_sample_rate.clamp(c.min_sample_rate(), c.max_sample_rate());
            (rate.abs_diff(target_sample_rate), *c, rate)
        })
        .min_by_key(|(distance, _, _)| *distance)
        .map(|(_, config, rate)| config.with_sample_rate(rate))
        .ok_or_else(|| anyhow::anyhow!("No output device configuration with f32 samples and at most two channels"))
}

/// Mix interleaved samples down to mono by averaging channels.
///
/// # Arguments
/// * `data` - Interleaved samples; a trailing partial frame is dropped
/// * `channels` - Channel count; 0 and 1 return the input as is
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 | 1 => data.to_vec(),
        n => data.chunks_exact(n).map(|frame| frame.iter().sum::<f32>() / n as f32).collect(),
    }
}

/// Format seconds as `m:ss`.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds.floor() as u64 } else { 0 };
    format!("{}:{:02}", total / 60, total % 60)
}
