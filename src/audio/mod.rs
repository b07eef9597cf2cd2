//! Audio: decoding synthesized speech, playing it back and the player state
//! machine that drives both.
//!
//! Playback uses cpal with resampling to the device rate via rubato.

mod controller;
mod decode;
mod playback;
mod resampler;
mod source;
pub mod util;

pub use controller::{Notice, PlaybackController, PlaybackState, SaveOutcome, SaveTicket, default_filename};
pub use playback::CpalEngine;
pub use source::{AudioDecoder, PlayableSource, PlaybackError, PlaybackEvent, PlaybackEventKind, SourceId};
