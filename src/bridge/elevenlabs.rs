//! ElevenLabs text-to-speech HTTP client.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use super::types::VoiceSettings;

/// Connection and model parameters for the speech endpoint.
#[derive(Debug, Clone)]
pub struct SpeechClientConfig {
    pub api_url: String,
    pub voice_id: String,
    pub model_id: String,
    pub output_format: String,
    pub timeout: Duration,
    /// Send the selected language as `language_code` (only some models accept it).
    pub send_language_code: bool,
}

/// Failures of a synthesis request, worded for display.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Invalid API key. Please check your ElevenLabs API key in Settings.")]
    InvalidApiKey,
    #[error("Rate limit exceeded. Please try again later or upgrade your ElevenLabs plan.")]
    RateLimited,
    #[error("API error ({status}): {body}")]
    Api { status: StatusCode, body: String },
    #[error("Request timeout. Please check your internet connection.")]
    Timeout,
    #[error("Connection failed. Please check your internet connection.")]
    Connect,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Failed to read response: {0}")]
    Body(String),
}

impl From<reqwest::Error> for SpeechError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SpeechError::Timeout
        } else if e.is_connect() {
            SpeechError::Connect
        } else {
            SpeechError::Network(e.to_string())
        }
    }
}

/// Client for the ElevenLabs `text-to-speech/{voice_id}` endpoint.
pub struct SpeechClient {
    http: reqwest::Client,
    config: SpeechClientConfig,
}

impl SpeechClient {
    /// Create a new speech client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: SpeechClientConfig) -> Result<Self> {
        info!("Speech endpoint: {} (voice {}, model {})", config.api_url, config.voice_id, config.model_id);

        let http = reqwest::Client::builder().timeout(config.timeout).build().context("Failed to create HTTP client")?;

        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}?output_format={}",
            self.config.api_url.trim_end_matches('/'),
            self.config.voice_id,
            self.config.output_format
        )
    }

    /// Synthesize `text` and return the encoded audio bytes.
    ///
    /// # Arguments
    /// * `api_key` - Sent as the `xi-api-key` header
    /// * `text` - Text to speak, pause directives included
    /// * `language` - Language code; only sent when `send_language_code` is set
    /// * `voice` - Optional voice settings for the request body
    ///
    /// # Errors
    /// Returns a [`SpeechError`] for non-success statuses, timeouts and
    /// connection failures, each with the message shown to the user.
    pub async fn synthesize(&self, api_key: &str, text: &str, language: &str, voice: Option<&VoiceSettings>) -> Result<Vec<u8>, SpeechError> {
        let mut body = json!({
            "text": text,
            "model_id": self.config.model_id,
        });
        if let Some(voice) = voice {
            body["voice_settings"] = json!(voice);
        }
        if self.config.send_language_code {
            body["language_code"] = json!(language);
        }

        debug!("Requesting synthesis of {} characters (language {})", text.chars().count(), language);

        let response = self
            .http
            .post(self.endpoint())
            .header("xi-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await.map_err(|e| SpeechError::Body(e.to_string()))?;
            info!("🎵 Received {} bytes of audio", bytes.len());
            return Ok(bytes.to_vec());
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(SpeechError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(SpeechError::RateLimited),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(SpeechError::Api { status, body })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config(api_url: String) -> SpeechClientConfig {
        SpeechClientConfig {
            api_url,
            voice_id: "voice-1".into(),
            model_id: "eleven_multilingual_v2".into(),
            output_format: "mp3_44100_128".into(),
            timeout: Duration::from_secs(5),
            send_language_code: false,
        }
    }

    #[tokio::test]
    async fn test_synthesize_posts_text_and_voice_settings() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/text-to-speech/voice-1")
            .match_query(Matcher::UrlEncoded("output_format".into(), "mp3_44100_128".into()))
            .match_header("xi-api-key", "secret")
            .match_body(Matcher::PartialJson(json!({
                "text": "Hello",
                "model_id": "eleven_multilingual_v2",
                "voice_settings": {"stability": 0.5, "similarity_boost": 0.75, "style": 0.0}
            })))
            .with_status(200)
            .with_body("ID3-audio")
            .create_async()
            .await;

        let client = SpeechClient::new(config(server.url())).unwrap();
        let audio = client.synthesize("secret", "Hello", "en", Some(&VoiceSettings::default())).await.unwrap();

        assert_eq!(audio, b"ID3-audio");
        mock.assert_async().await;
    }

    async fn synthesize_with_status(status: usize, body: &str) -> SpeechError {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("POST", Matcher::Any).with_status(status).with_body(body).create_async().await;
        let client = SpeechClient::new(config(server.url())).unwrap();
        client.synthesize("key", "Hi", "en", None).await.unwrap_err()
    }

    #[tokio::test]
    async fn test_status_codes_map_to_messages() {
        assert!(matches!(synthesize_with_status(401, "").await, SpeechError::InvalidApiKey));
        assert!(synthesize_with_status(429, "").await.to_string().starts_with("Rate limit exceeded"));
        assert_eq!(synthesize_with_status(500, "boom").await.to_string(), "API error (500 Internal Server Error): boom");
    }

    #[tokio::test]
    async fn test_language_code_sent_when_enabled() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .match_body(Matcher::PartialJson(json!({"language_code": "fr"})))
            .with_status(200)
            .with_body("x")
            .create_async()
            .await;

        let client = SpeechClient::new(SpeechClientConfig { send_language_code: true, ..config(server.url()) }).unwrap();
        client.synthesize("key", "Bonjour", "fr", None).await.unwrap();
        mock.assert_async().await;
    }
}
