//! Playback and save state machine around a single audio artifact.
//!
//! ```text
//! Idle --load--> Loaded --play--> Playing --pause--> Paused
//!                  ^                 |  ^--play-------'  |
//!                  '---stop / end----'------stop---------'
//! any --dispose--> Disposed
//! ```
//!
//! The controller owns at most one decoded source and releases it exactly
//! once: on replacement, on [`PlaybackController::clear`] and on disposal.
//! Saving runs beside playback and is limited to one request at a time. It
//! works from the base64 artifact, so audio stays saveable when no output
//! device could be opened.

use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info, warn};

use super::source::{AudioDecoder, PlayableSource, PlaybackError, PlaybackEvent, PlaybackEventKind, SourceId};
use crate::bridge::{ApiResponse, BridgeError, SaveAudioRequest};

/// How long a save confirmation stays visible.
pub const NOTICE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loaded,
    Playing,
    Paused,
    Disposed,
}

impl PlaybackState {
    fn name(self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loaded => "loaded",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Disposed => "disposed",
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Message the player wants shown. `None` payloads fall back to the
/// locale's default wording.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Saved,
    SaveFailed(Option<String>),
    /// The bridge call itself failed.
    Unexpected(Option<String>),
    PlaybackFailed(String),
}

impl Notice {
    pub fn is_success(&self) -> bool {
        matches!(self, Notice::Saved)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveNotice {
    pub notice: Notice,
    /// `None` means it stays until dismissed.
    pub expires_at: Option<Instant>,
}

/// Result of a finished save as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(String),
    Cancelled,
    Failed,
    /// The controller was disposed before the result arrived.
    Discarded,
}

/// A save handed out by [`PlaybackController::begin_save`].
#[derive(Debug, Clone)]
pub struct SaveTicket {
    /// Source playing the artifact, if an output device was available
    pub source: Option<SourceId>,
    pub request: SaveAudioRequest,
}

struct LoadedAudio {
    source: Box<dyn PlayableSource>,
    duration: f64,
    position: f64,
}

/// Controller for one audio artifact at a time.
pub struct PlaybackController<D: AudioDecoder> {
    decoder: D,
    state: PlaybackState,
    current: Option<LoadedAudio>,
    /// Base64 payload as received, reused verbatim for saving
    artifact: Option<String>,
    saving: bool,
    notice: Option<ActiveNotice>,
}

impl<D: AudioDecoder> PlaybackController<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder, state: PlaybackState::Idle, current: None, artifact: None, saving: false, notice: None }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn position(&self) -> f64 {
        self.current.as_ref().map_or(0.0, |c| c.position)
    }

    pub fn duration(&self) -> f64 {
        self.current.as_ref().map_or(0.0, |c| c.duration)
    }

    /// True when there is audio to save, playable or not.
    pub fn has_artifact(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn notice(&self) -> Option<&ActiveNotice> {
        self.notice.as_ref()
    }

    /// Decode a base64 artifact and make it the current source.
    ///
    /// The previous source is released first, so a failed load leaves the
    /// controller idle rather than holding stale audio.
    ///
    /// # Arguments
    /// * `base64_audio` - Encoded audio as returned by `generate_tts`
    ///
    /// # Returns
    /// The id of the new source. On [`PlaybackError::Output`] the artifact
    /// is still kept for saving and the error is also shown as a notice;
    /// invalid base64 or undecodable audio discard it.
    pub fn load(&mut self, base64_audio: &str) -> Result<SourceId, PlaybackError> {
        if self.state == PlaybackState::Disposed {
            return Err(PlaybackError::Disposed);
        }
        self.release_current();
        self.state = PlaybackState::Idle;

        let artifact = base64_audio.trim();
        let bytes = STANDARD.decode(artifact.as_bytes()).map_err(|e| PlaybackError::Base64(e.to_string()))?;
        let source = match self.decoder.decode(&bytes) {
            Ok(source) => source,
            Err(PlaybackError::Output(message)) => {
                warn!("No audio output, audio kept for saving: {}", message);
                self.artifact = Some(artifact.to_string());
                self.notice = Some(ActiveNotice { notice: Notice::PlaybackFailed(message.clone()), expires_at: None });
                return Err(PlaybackError::Output(message));
            }
            Err(e) => return Err(e),
        };
        let id = source.id();

        info!("🔈 Loaded audio {:?} ({} bytes)", id, bytes.len());
        self.current = Some(LoadedAudio { source, duration: 0.0, position: 0.0 });
        self.artifact = Some(artifact.to_string());
        self.state = PlaybackState::Loaded;
        Ok(id)
    }

    /// Drop the current audio, e.g. when a new generation starts.
    pub fn clear(&mut self) {
        if self.state == PlaybackState::Disposed {
            return;
        }
        self.release_current();
        self.state = PlaybackState::Idle;
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        match (self.state, self.current.as_mut()) {
            (PlaybackState::Loaded | PlaybackState::Paused, Some(current)) => {
                current.source.play()?;
                self.state = PlaybackState::Playing;
                Ok(())
            }
            (state, _) => Err(invalid("play", state)),
        }
    }

    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        match (self.state, self.current.as_mut()) {
            (PlaybackState::Playing, Some(current)) => {
                current.source.pause();
                current.position = clamp(current.source.position(), current.duration);
                self.state = PlaybackState::Paused;
                Ok(())
            }
            (state, _) => Err(invalid("pause", state)),
        }
    }

    pub fn stop(&mut self) -> Result<(), PlaybackError> {
        match (self.state, self.current.as_mut()) {
            (PlaybackState::Playing | PlaybackState::Paused, Some(current)) => {
                current.source.pause();
                current.source.seek(0.0);
                current.position = 0.0;
                self.state = PlaybackState::Loaded;
                Ok(())
            }
            (state, _) => Err(invalid("stop", state)),
        }
    }

    /// Move to `seconds`, clamped to `[0, duration]`. Returns the position
    /// actually used. Play/pause state is unchanged.
    pub fn seek(&mut self, seconds: f64) -> Result<f64, PlaybackError> {
        match (self.state, self.current.as_mut()) {
            (PlaybackState::Loaded | PlaybackState::Playing | PlaybackState::Paused, Some(current)) => {
                let target = clamp(seconds, current.duration);
                current.source.seek(target);
                current.position = target;
                Ok(target)
            }
            (state, _) => Err(invalid("seek", state)),
        }
    }

    /// Apply an engine event. Events from sources other than the current
    /// one are stale and ignored.
    ///
    /// # Returns
    /// `true` if the event belonged to the current source and was applied
    pub fn handle_event(&mut self, event: PlaybackEvent) -> bool {
        let state = self.state;
        let Some(current) = self.current.as_mut().filter(|c| c.source.id() == event.source) else {
            debug!("Ignoring stale playback event {:?}", event);
            return false;
        };

        match event.kind {
            PlaybackEventKind::DurationChanged(secs) => {
                current.duration = if secs.is_finite() && secs > 0.0 { secs } else { 0.0 };
                debug!("Duration of {:?}: {:.2}s", event.source, current.duration);
            }
            PlaybackEventKind::Ended => {
                if state == PlaybackState::Playing {
                    current.source.seek(0.0);
                    current.position = 0.0;
                    self.state = PlaybackState::Loaded;
                }
            }
            PlaybackEventKind::Error(message) => {
                warn!("Playback engine error: {}", message);
                current.source.pause();
                current.position = clamp(current.source.position(), current.duration);
                if state == PlaybackState::Playing {
                    self.state = PlaybackState::Paused;
                }
                self.notice = Some(ActiveNotice { notice: Notice::PlaybackFailed(message), expires_at: None });
            }
        }
        true
    }

    /// Periodic update: refresh the position while playing and expire
    /// timed notices.
    pub fn tick(&mut self, now: Instant) {
        if self.state == PlaybackState::Playing
            && let Some(current) = self.current.as_mut()
        {
            current.position = clamp(current.source.position(), current.duration);
        }

        if self.notice.as_ref().and_then(|n| n.expires_at).is_some_and(|deadline| now >= deadline) {
            self.notice = None;
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Start saving the current artifact under a timestamped default name.
    ///
    /// Independent of the play state; only one save may run at a time.
    ///
    /// # Arguments
    /// * `now` - Wall clock time used for the default filename
    ///
    /// # Returns
    /// A ticket carrying the `save_audio_file` request, to be handed back to
    /// [`Self::complete_save`] with the bridge's answer.
    pub fn begin_save(&mut self, now: OffsetDateTime) -> Result<SaveTicket, PlaybackError> {
        if self.state == PlaybackState::Disposed {
            return Err(PlaybackError::Disposed);
        }
        if self.saving {
            return Err(PlaybackError::SaveInFlight);
        }
        let artifact = self.artifact.clone().ok_or(PlaybackError::NothingLoaded)?;

        self.saving = true;
        self.notice = None;

        Ok(SaveTicket {
            source: self.current.as_ref().map(|c| c.source.id()),
            request: SaveAudioRequest { base64_audio: artifact, default_filename: default_filename(now) },
        })
    }

    /// Record the bridge's answer to a save started with [`Self::begin_save`].
    ///
    /// # Arguments
    /// * `ticket` - The ticket `begin_save` returned
    /// * `result` - Answer of `save_audio_file`
    /// * `now` - Start of the success notice's timeout
    pub fn complete_save(&mut self, ticket: SaveTicket, result: Result<ApiResponse<String>, BridgeError>, now: Instant) -> SaveOutcome {
        if self.state == PlaybackState::Disposed {
            debug!("Discarding save result for {:?} after disposal", ticket.source);
            return SaveOutcome::Discarded;
        }
        self.saving = false;

        let (notice, outcome) = match result {
            Ok(response) if response.success => {
                let detail = response.data.unwrap_or_default();
                info!("💾 {}", if detail.is_empty() { "File saved" } else { detail.as_str() });
                (Some(ActiveNotice { notice: Notice::Saved, expires_at: Some(now + NOTICE_TIMEOUT) }), SaveOutcome::Saved(detail))
            }
            Ok(response) if response.is_cancelled() => {
                debug!("Save cancelled by user");
                (None, SaveOutcome::Cancelled)
            }
            Ok(response) => {
                let message = response.error.filter(|e| !e.trim().is_empty());
                warn!("Save failed: {}", message.as_deref().unwrap_or("no details"));
                (Some(ActiveNotice { notice: Notice::SaveFailed(message), expires_at: None }), SaveOutcome::Failed)
            }
            Err(e) => {
                warn!("Save call failed: {}", e);
                (Some(ActiveNotice { notice: Notice::Unexpected(e.message().map(str::to_string)), expires_at: None }), SaveOutcome::Failed)
            }
        };

        self.notice = notice;
        outcome
    }

    /// Release everything; later events and save results are ignored.
    pub fn dispose(&mut self) {
        if self.state == PlaybackState::Disposed {
            return;
        }
        self.release_current();
        self.state = PlaybackState::Disposed;
        self.saving = false;
        self.notice = None;
    }

    fn release_current(&mut self) {
        self.artifact = None;
        if let Some(mut current) = self.current.take() {
            current.source.release();
        }
    }
}

impl<D: AudioDecoder> Drop for PlaybackController<D> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn invalid(action: &'static str, state: PlaybackState) -> PlaybackError {
    PlaybackError::InvalidTransition { action, state: state.name() }
}

fn clamp(seconds: f64, duration: f64) -> f64 {
    if seconds.is_nan() { 0.0 } else { seconds.clamp(0.0, duration.max(0.0)) }
}

/// Default save name, e.g. `voicedesk-2026-10-19T14-03-22-481.mp3` (UTC).
pub fn default_filename(now: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]T[hour]-[minute]-[second]-[subsecond digits:3]");
    let stamp = now.to_offset(time::UtcOffset::UTC).format(&format).unwrap_or_else(|_| now.unix_timestamp().to_string());
    format!("voicedesk-{}.mp3", stamp)
}
