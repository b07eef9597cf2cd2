//! Audio playback using cpal.
//!
//! Each decoded artifact gets its own output stream reading from an
//! immutable sample buffer through an atomic cursor. Pausing makes the
//! callback output silence; seeking moves the cursor. The stream is dropped
//! when the source is released.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::decode::decode_audio;
use super::resampler::resample;
use super::source::{AudioDecoder, PlayableSource, PlaybackError, PlaybackEvent, PlaybackEventKind, SourceId};
use super::util::{find_best_config, get_device_name};

/// Device rate to ask for when the device has no default configuration.
const FALLBACK_SAMPLE_RATE: u32 = 48000;

/// Decoder producing sources that play on the default output device.
pub struct CpalEngine {
    events: mpsc::UnboundedSender<PlaybackEvent>,
    next_id: u64,
}

impl CpalEngine {
    /// Create an engine that reports playback events on `events`.
    ///
    /// No device is touched here; each [`AudioDecoder::decode`] call opens
    /// its own output stream and fails with [`PlaybackError::Output`] when
    /// none is available.
    pub fn new(events: mpsc::UnboundedSender<PlaybackEvent>) -> Self {
        Self { events, next_id: 1 }
    }
}

impl AudioDecoder for CpalEngine {
    fn decode(&mut self, bytes: &[u8]) -> Result<Box<dyn PlayableSource>, PlaybackError> {
        let id = SourceId(self.next_id);
        self.next_id += 1;

        let decoded = decode_audio(bytes)?;
        let source = StreamSource::open(id, decoded.samples, decoded.sample_rate, self.events.clone()).map_err(|e| PlaybackError::Output(format!("{:#}", e)))?;

        // Duration is published as an event, never returned synchronously
        let _ = self.events.send(PlaybackEvent::new(id, PlaybackEventKind::DurationChanged(source.duration_secs())));

        Ok(Box::new(source))
    }
}

/// One decoded buffer bound to an output stream.
pub struct StreamSource {
    id: SourceId,
    /// Kept alive to maintain the audio stream; `None` once released
    stream: Option<Stream>,
    samples: Arc<[f32]>,
    device_sample_rate: u32,
    /// Next sample the callback will output
    cursor: Arc<AtomicUsize>,
    /// Callback outputs audio only while set
    playing: Arc<AtomicBool>,
}

impl StreamSource {
    /// Resample `samples` to the device rate and open a paused output stream.
    ///
    /// # Errors
    /// Returns an error if:
    /// - No output device is available
    /// - No usable output configuration exists
    /// - Resampling fails
    /// - Failed to build or start the output stream
    fn open(id: SourceId, samples: Vec<f32>, sample_rate: u32, events: mpsc::UnboundedSender<PlaybackEvent>) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().context("No output device available")?;

        info!("Using output device: {}", get_device_name(&device));

        let device_sample_rate = match device.default_output_config() {
            Ok(default_config) => default_config.sample_rate(),
            Err(_) => FALLBACK_SAMPLE_RATE,
        };

        let supported_configs = device.supported_output_configs().context("Failed to get supported output configs")?;
        let config = find_best_config(supported_configs, device_sample_rate)?;
        let device_sample_rate = config.sample_rate();

        let samples: Arc<[f32]> = if device_sample_rate != sample_rate {
            debug!("Resampling {} Hz -> {} Hz", sample_rate, device_sample_rate);
            resample(&samples, sample_rate, device_sample_rate)?.into()
        } else {
            samples.into()
        };

        let cursor = Arc::new(AtomicUsize::new(0));
        let playing = Arc::new(AtomicBool::new(false));

        let channels = config.channels() as usize;
        let stream_config: StreamConfig = config.config();

        let cb_samples = samples.clone();
        let cb_cursor = cursor.clone();
        let cb_playing = playing.clone();
        let end_events = events.clone();

        let err_fn = move |err: cpal::StreamError| {
            tracing::error!("Audio playback error: {}", err);
            let _ = events.send(PlaybackEvent::new(id, PlaybackEventKind::Error(err.to_string())));
        };

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !cb_playing.load(Ordering::Acquire) {
                    data.fill(0.0);
                    return;
                }

                let start = cb_cursor.load(Ordering::Acquire);
                let mut pos = start;

                for frame in data.chunks_mut(channels) {
                    let sample = cb_samples.get(pos).copied().unwrap_or(0.0);
                    if pos < cb_samples.len() {
                        pos += 1;
                    }
                    // Duplicate mono sample to all channels
                    frame.fill(sample);
                }

                // A concurrent seek wins over our advance
                let _ = cb_cursor.compare_exchange(start, pos, Ordering::AcqRel, Ordering::Relaxed);

                if pos >= cb_samples.len() && cb_playing.swap(false, Ordering::AcqRel) {
                    let _ = end_events.send(PlaybackEvent::new(id, PlaybackEventKind::Ended));
                }
            },
            err_fn,
            None,
        )?;

        stream.play().context("Failed to start playback stream")?;

        info!("Audio ready: {} samples at {} Hz, {} channel(s)", samples.len(), device_sample_rate, channels);

        Ok(Self { id, stream: Some(stream), samples, device_sample_rate, cursor, playing })
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.device_sample_rate as f64
    }
}

impl PlayableSource for StreamSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.stream.is_none() {
            return Err(PlaybackError::Output("stream already released".to_string()));
        }
        if self.cursor.load(Ordering::Acquire) >= self.samples.len() {
            self.cursor.store(0, Ordering::Release);
        }
        self.playing.store(true, Ordering::Release);
        Ok(())
    }

    fn pause(&mut self) {
        self.playing.store(false, Ordering::Release);
    }

    fn seek(&mut self, seconds: f64) {
        let target = (seconds.max(0.0) * self.device_sample_rate as f64) as usize;
        self.cursor.store(target.min(self.samples.len()), Ordering::Release);
    }

    fn position(&self) -> f64 {
        self.cursor.load(Ordering::Acquire) as f64 / self.device_sample_rate as f64
    }

    fn release(&mut self) {
        self.playing.store(false, Ordering::Release);
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause stream on release: {}", e);
            }
            drop(stream);
            debug!("Released audio source {:?}", self.id);
        }
        self.samples = Arc::from(Vec::new());
    }
}

impl Drop for StreamSource {
    fn drop(&mut self) {
        self.playing.store(false, Ordering::SeqCst);
    }
}
