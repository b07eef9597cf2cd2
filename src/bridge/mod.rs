//! Host bridge: the four backend operations the front-end relies on.
//!
//! Every operation answers with an [`ApiResponse`] envelope. A returned
//! `Err` means the call itself failed (transport, task panic) rather than
//! the operation reporting a failure.

mod credentials;
mod dialog;
mod elevenlabs;
mod native;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use credentials::{CredentialError, CredentialStore, KeyringStore};
pub use dialog::{FixedPathDialog, PromptRequest, PromptSaveDialog, SaveDialog};
pub use elevenlabs::{SpeechClient, SpeechClientConfig};
pub use native::NativeBridge;
pub use types::{ApiResponse, GenerateTtsRequest, SAVE_CANCELLED, SaveAudioRequest, VoiceParam, VoiceSettings};

/// Failure of the bridge call itself.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BridgeError {
    #[error("{0}")]
    Transport(String),
    #[error("bridge call aborted")]
    Aborted,
}

impl BridgeError {
    /// Message to show, if the failure carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            BridgeError::Transport(msg) if !msg.trim().is_empty() => Some(msg),
            _ => None,
        }
    }
}

pub type BridgeResult<T> = Result<ApiResponse<T>, BridgeError>;

/// Backend operations consumed by the application.
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Stored provider key, or no data when none is stored.
    async fn get_api_key(&self) -> BridgeResult<String>;

    /// Store a trimmed, non-empty key.
    async fn set_api_key(&self, api_key: String) -> BridgeResult<()>;

    /// Synthesize speech; the payload is base64-encoded audio.
    async fn generate_tts(&self, request: GenerateTtsRequest) -> BridgeResult<String>;

    /// Write audio to a user-chosen location; fails with [`SAVE_CANCELLED`]
    /// when the user backs out.
    async fn save_audio_file(&self, request: SaveAudioRequest) -> BridgeResult<String>;
}
