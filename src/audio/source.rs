//! Playback capability seen by the controller.
//!
//! The controller never touches an audio device directly: it hands encoded
//! bytes to an [`AudioDecoder`] and drives the returned [`PlayableSource`].
//! Asynchronous facts (duration, natural end, engine errors) come back as
//! [`PlaybackEvent`]s tagged with the source that produced them.

use thiserror::Error;

/// Identity of one decoded source. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u64);

/// What a playback engine reports.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEventKind {
    /// Duration in seconds became known.
    DurationChanged(f64),
    /// Playback reached the end of the audio.
    Ended,
    /// The engine failed while playing.
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackEvent {
    pub source: SourceId,
    pub kind: PlaybackEventKind,
}

impl PlaybackEvent {
    pub fn new(source: SourceId, kind: PlaybackEventKind) -> Self {
        Self { source, kind }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlaybackError {
    #[error("audio payload is not valid base64: {0}")]
    Base64(String),
    #[error("failed to decode audio: {0}")]
    Decode(String),
    #[error("audio output error: {0}")]
    Output(String),
    #[error("cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: &'static str },
    #[error("no audio loaded")]
    NothingLoaded,
    #[error("a save is already in progress")]
    SaveInFlight,
    #[error("player has been disposed")]
    Disposed,
}

/// A decoded, playable audio buffer.
pub trait PlayableSource {
    fn id(&self) -> SourceId;

    fn play(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self);

    /// Move to `seconds`; callers clamp to the known duration.
    fn seek(&mut self, seconds: f64);

    /// Current position in seconds.
    fn position(&self) -> f64;

    /// Free the decoded buffer and any device resources.
    fn release(&mut self);
}

/// Turns encoded audio into a playable source.
pub trait AudioDecoder {
    fn decode(&mut self, bytes: &[u8]) -> Result<Box<dyn PlayableSource>, PlaybackError>;
}
