//! Request and response shapes exchanged with the host bridge.

use serde::{Deserialize, Serialize};

/// Error text the bridge uses when the user dismisses the save dialog.
pub const SAVE_CANCELLED: &str = "Save cancelled";

/// Uniform envelope around every bridge call.
///
/// `success == true` carries `data` when the call has a payload;
/// `success == false` always carries a human-readable `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    /// Success without a payload.
    pub fn ok() -> Self {
        Self { success: true, data: None, error: None }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()) }
    }

    pub fn is_cancelled(&self) -> bool {
        !self.success && self.error.as_deref() == Some(SAVE_CANCELLED)
    }
}

/// Voice parameters sent with each synthesis request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self { stability: 0.5, similarity_boost: 0.75, style: 0.0 }
    }
}

/// Which voice parameter to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceParam {
    Stability,
    SimilarityBoost,
    Style,
}

impl std::str::FromStr for VoiceParam {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stability" => Ok(VoiceParam::Stability),
            "similarity" | "similarity_boost" | "similarity-boost" => Ok(VoiceParam::SimilarityBoost),
            "style" => Ok(VoiceParam::Style),
            other => Err(format!("unknown voice parameter '{}' (stability, similarity, style)", other)),
        }
    }
}

impl VoiceSettings {
    /// Set one parameter. Values must lie in `[0, 1]`.
    pub fn set(&mut self, param: VoiceParam, value: f32) -> Result<(), String> {
        let value = parse_unit_value(value)?;
        match param {
            VoiceParam::Stability => self.stability = value,
            VoiceParam::SimilarityBoost => self.similarity_boost = value,
            VoiceParam::Style => self.style = value,
        }
        Ok(())
    }
}

fn parse_unit_value(value: f32) -> Result<f32, String> {
    if (0.0..=1.0).contains(&value) { Ok(value) } else { Err(format!("value must be between 0.0 and 1.0, got {}", value)) }
}

/// Parse and validate a voice parameter for clap.
pub fn parse_voice_value(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("'{}' is not a valid float", s))?;
    parse_unit_value(value)
}

/// Input of `generate_tts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateTtsRequest {
    pub text: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_settings: Option<VoiceSettings>,
}

/// Input of `save_audio_file`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAudioRequest {
    pub base64_audio: String,
    pub default_filename: String,
}
