//! Bridge implementation for the terminal application.
//!
//! Keys live in the OS keyring, synthesis goes to ElevenLabs over HTTPS and
//! audio is written wherever the save dialog points.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info, warn};

use super::credentials::CredentialStore;
use super::dialog::SaveDialog;
use super::elevenlabs::SpeechClient;
use super::types::{ApiResponse, GenerateTtsRequest, SAVE_CANCELLED, SaveAudioRequest};
use super::{BridgeError, BridgeResult, HostBridge};
use crate::text::MAX_TEXT_LENGTH;

const KEY_NOT_FOUND: &str = "API key not found. Please set it in Settings.";

/// Host bridge backed by the keyring, the speech API and the local disk.
pub struct NativeBridge {
    credentials: Arc<dyn CredentialStore>,
    speech: SpeechClient,
    dialog: Box<dyn SaveDialog>,
}

impl NativeBridge {
    /// Create a bridge over the given backends.
    ///
    /// # Arguments
    /// * `credentials` - Where the provider key is stored
    /// * `speech` - HTTP client for synthesis
    /// * `dialog` - Chooses the destination of `save_audio_file`
    pub fn new(credentials: Arc<dyn CredentialStore>, speech: SpeechClient, dialog: Box<dyn SaveDialog>) -> Self {
        Self { credentials, speech, dialog }
    }

    /// Keyring access blocks, so it runs off the async workers.
    async fn load_key(&self) -> Result<Result<Option<String>, String>, BridgeError> {
        let store = self.credentials.clone();
        let loaded = tokio::task::spawn_blocking(move || store.load()).await.map_err(|e| BridgeError::Transport(e.to_string()))?;
        Ok(loaded.map_err(|e| e.to_string()))
    }
}

#[async_trait]
impl HostBridge for NativeBridge {
    async fn get_api_key(&self) -> BridgeResult<String> {
        Ok(match self.load_key().await? {
            Ok(Some(key)) => ApiResponse::success(key),
            Ok(None) => ApiResponse::ok(),
            Err(e) => ApiResponse::error(e),
        })
    }

    async fn set_api_key(&self, api_key: String) -> BridgeResult<()> {
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            return Ok(ApiResponse::error("API key cannot be empty"));
        }

        let store = self.credentials.clone();
        let stored = tokio::task::spawn_blocking(move || store.store(&api_key)).await.map_err(|e| BridgeError::Transport(e.to_string()))?;

        Ok(match stored {
            Ok(()) => {
                info!("🔑 API key stored");
                ApiResponse::ok()
            }
            Err(e) => ApiResponse::error(e.to_string()),
        })
    }

    async fn generate_tts(&self, request: GenerateTtsRequest) -> BridgeResult<String> {
        let text = request.text.trim();
        if text.is_empty() {
            return Ok(ApiResponse::error("Text cannot be empty"));
        }
        if text.chars().count() > MAX_TEXT_LENGTH {
            return Ok(ApiResponse::error(format!("Text exceeds maximum length of {} characters", MAX_TEXT_LENGTH)));
        }

        let api_key = match self.load_key().await? {
            Ok(Some(key)) => key,
            Ok(None) => return Ok(ApiResponse::error(KEY_NOT_FOUND)),
            Err(e) => return Ok(ApiResponse::error(e)),
        };

        Ok(match self.speech.synthesize(&api_key, text, &request.language, request.voice_settings.as_ref()).await {
            Ok(bytes) => ApiResponse::success(STANDARD.encode(&bytes)),
            Err(e) => {
                warn!("Synthesis failed: {}", e);
                ApiResponse::error(e.to_string())
            }
        })
    }

    async fn save_audio_file(&self, request: SaveAudioRequest) -> BridgeResult<String> {
        let audio = match STANDARD.decode(request.base64_audio.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => return Ok(ApiResponse::error(format!("Failed to decode audio data: {}", e))),
        };

        let Some(path) = self.dialog.choose_path(&request.default_filename).await else {
            debug!("Save dialog dismissed");
            return Ok(ApiResponse::error(SAVE_CANCELLED));
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(ApiResponse::error(format!("Failed to save file: {}", e)));
        }

        Ok(match tokio::fs::write(&path, &audio).await {
            Ok(()) => {
                info!("💾 Saved {} bytes to {}", audio.len(), path.display());
                ApiResponse::success(format!("File saved successfully: {}", path.display()))
            }
            Err(e) => ApiResponse::error(format!("Failed to save file: {}", e)),
        })
    }
}
