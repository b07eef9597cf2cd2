//! Application session: text buffer, selections and request bookkeeping.
//!
//! Everything here is synchronous. The interactive loop calls `begin_*` to
//! validate and build a bridge request, runs the request elsewhere, then
//! feeds the result back through the matching `finish_*`.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeError, BridgeResult, GenerateTtsRequest, VoiceParam, VoiceSettings};
use crate::config::languages::{self, Language};
use crate::config::locale::{Messages, UiLocale};
use crate::text::breaks::BreakSettingsError;
use crate::text::{self, BreakSettings, apply_breaks};

/// Whether a provider key is available. Gates the main view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Unconfigured,
    Ready,
}

/// Input rejected before any bridge call.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("text is empty")]
    EmptyText,
    #[error("text exceeds {} characters", text::MAX_TEXT_LENGTH)]
    TooLong,
    #[error("API key is empty")]
    EmptyApiKey,
    #[error("a generation is already in progress")]
    Busy,
    #[error("no API key configured")]
    NotConfigured,
    #[error("unsupported language '{0}'")]
    UnknownLanguage(String),
    #[error("{0}")]
    Voice(String),
    #[error(transparent)]
    Breaks(#[from] BreakSettingsError),
}

/// Identifies one generation request; results carrying an older id are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum GenerateOutcome {
    /// Base64 audio ready for the player.
    Audio(String),
    /// Message already stored as the session error.
    Failed(String),
    Stale,
}

pub struct Session {
    locale: UiLocale,
    text: String,
    language: &'static Language,
    voice: VoiceSettings,
    breaks: BreakSettings,
    state: AppState,
    error: Option<String>,
    next_request: u64,
    in_flight: Option<RequestId>,
}

impl Session {
    pub fn new(locale: UiLocale, language: &str, voice: VoiceSettings, breaks: BreakSettings) -> Self {
        Self {
            locale,
            text: String::new(),
            language: languages::get_language(language).unwrap_or_else(languages::default_language),
            voice,
            breaks,
            state: AppState::Unconfigured,
            error: None,
            next_request: 1,
            in_flight: None,
        }
    }

    pub fn messages(&self) -> &'static Messages {
        self.locale.messages()
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> &'static Language {
        self.language
    }

    pub fn voice(&self) -> VoiceSettings {
        self.voice
    }

    pub fn breaks(&self) -> BreakSettings {
        self.breaks
    }

    /// Inline error shown under the generate action.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Replace the buffer. Returns true when the input was truncated.
    pub fn set_text(&mut self, text: &str) -> bool {
        self.text = text::clamp_length(text);
        self.text.len() < text.len()
    }

    /// Append a line to the buffer. Returns true when the result was truncated.
    pub fn append_text(&mut self, more: &str) -> bool {
        let combined = if self.text.is_empty() { more.to_string() } else { format!("{}\n{}", self.text, more) };
        self.set_text(&combined)
    }

    pub fn clear_text(&mut self) {
        self.text.clear();
    }

    pub fn set_language(&mut self, code: &str) -> Result<&'static Language, ValidationError> {
        let language = languages::get_language(code).ok_or_else(|| ValidationError::UnknownLanguage(code.to_string()))?;
        self.language = language;
        Ok(language)
    }

    pub fn set_voice(&mut self, param: VoiceParam, value: f32) -> Result<(), ValidationError> {
        self.voice.set(param, value).map_err(ValidationError::Voice)
    }

    pub fn set_period_break(&mut self, seconds: f64) -> Result<(), ValidationError> {
        self.breaks = self.breaks.with_period(seconds)?;
        Ok(())
    }

    pub fn set_comma_break(&mut self, seconds: Option<f64>) -> Result<(), ValidationError> {
        self.breaks = self.breaks.with_comma(seconds)?;
        Ok(())
    }

    /// Rewrite the buffer with pause directives. Returns whether it changed.
    ///
    /// The result is stored whole even past the character limit; directives
    /// are never cut. `begin_generate` refuses such a buffer until it is edited.
    pub fn apply_breaks(&mut self) -> bool {
        let updated = apply_breaks(&self.text, &self.breaks);
        let changed = updated != self.text;
        self.text = updated;
        if text::is_over_limit(&self.text) {
            warn!("Text with pauses is {} characters, over the limit", text::char_count(&self.text));
        }
        changed
    }

    /// Record the answer of `get_api_key`.
    pub fn apply_key_check(&mut self, result: BridgeResult<String>) -> AppState {
        self.state = match result {
            Ok(response) if response.success && response.data.as_deref().is_some_and(|key| !key.trim().is_empty()) => AppState::Ready,
            Ok(response) => {
                if let Some(error) = response.error {
                    warn!("API key check failed: {}", error);
                }
                AppState::Unconfigured
            }
            Err(e) => {
                warn!("API key check failed: {}", e);
                AppState::Unconfigured
            }
        };
        debug!("App state: {:?}", self.state);
        self.state
    }

    /// Validate a key typed by the user; the trimmed key goes to `set_api_key`.
    pub fn begin_save_key(&mut self, raw: &str) -> Result<String, ValidationError> {
        let key = raw.trim();
        if key.is_empty() {
            self.error = Some(self.messages().enter_api_key.to_string());
            return Err(ValidationError::EmptyApiKey);
        }
        self.error = None;
        Ok(key.to_string())
    }

    /// Record the answer of `set_api_key`. On failure the message is returned
    /// and kept as the session error.
    pub fn finish_save_key(&mut self, result: BridgeResult<()>) -> Result<(), String> {
        let messages = self.messages();
        let failure = match result {
            Ok(response) if response.success => {
                info!("🔑 API key stored");
                self.state = AppState::Ready;
                self.error = None;
                return Ok(());
            }
            Ok(response) => response.error.filter(|e| !e.trim().is_empty()).unwrap_or_else(|| messages.api_key_save_failed.to_string()),
            Err(e) => transport_message(&e, messages),
        };
        self.error = Some(failure.clone());
        Err(failure)
    }

    /// Validate the buffer and build the synthesis request.
    pub fn begin_generate(&mut self) -> Result<(RequestId, GenerateTtsRequest), ValidationError> {
        if self.in_flight.is_some() {
            return Err(ValidationError::Busy);
        }
        if self.state == AppState::Unconfigured {
            return Err(ValidationError::NotConfigured);
        }
        if text::is_blank(&self.text) {
            self.error = Some(self.messages().enter_text.to_string());
            return Err(ValidationError::EmptyText);
        }
        if text::is_over_limit(self.text.trim()) {
            self.error = Some(self.messages().text_too_long.to_string());
            return Err(ValidationError::TooLong);
        }

        let id = RequestId(self.next_request);
        self.next_request += 1;
        self.in_flight = Some(id);
        self.error = None;

        let request = GenerateTtsRequest { text: self.text.trim().to_string(), language: self.language.code.to_string(), voice_settings: Some(self.voice) };
        info!("🗣️  Generating {} characters ({})", text::char_count(&request.text), request.language);
        Ok((id, request))
    }

    /// Record the answer of `generate_tts` for request `id`.
    pub fn finish_generate(&mut self, id: RequestId, result: BridgeResult<String>) -> GenerateOutcome {
        if self.in_flight != Some(id) {
            debug!("Ignoring stale generation result {:?}", id);
            return GenerateOutcome::Stale;
        }
        self.in_flight = None;

        let messages = self.messages();
        let failure = match result {
            Ok(response) if response.success => match response.data {
                Some(audio) if !audio.is_empty() => return GenerateOutcome::Audio(audio),
                _ => messages.generation_failed.to_string(),
            },
            Ok(response) => response.error.filter(|e| !e.trim().is_empty()).unwrap_or_else(|| messages.generation_failed.to_string()),
            Err(e) => transport_message(&e, messages),
        };

        warn!("Generation failed: {}", failure);
        self.error = Some(failure.clone());
        GenerateOutcome::Failed(failure)
    }
}

/// Message for a failed bridge call.
pub fn transport_message(error: &BridgeError, messages: &Messages) -> String {
    error.message().map(str::to_string).unwrap_or_else(|| messages.unexpected_error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ApiResponse;

    fn ready_session() -> Session {
        let mut session = Session::new(UiLocale::En, "en", VoiceSettings::default(), BreakSettings::default());
        session.apply_key_check(Ok(ApiResponse::success("sk-test".into())));
        session
    }

    #[test]
    fn test_key_check_sets_state() {
        let mut session = Session::new(UiLocale::En, "en", VoiceSettings::default(), BreakSettings::default());
        assert_eq!(session.state(), AppState::Unconfigured);
        assert_eq!(session.apply_key_check(Ok(ApiResponse::ok())), AppState::Unconfigured);
        assert_eq!(session.apply_key_check(Ok(ApiResponse::success("  ".into()))), AppState::Unconfigured);
        assert_eq!(session.apply_key_check(Ok(ApiResponse::success("sk".into()))), AppState::Ready);
        assert_eq!(session.apply_key_check(Err(BridgeError::Aborted)), AppState::Unconfigured);
    }

    #[test]
    fn test_blank_key_is_rejected_locally() {
        let mut session = Session::new(UiLocale::Fr, "en", VoiceSettings::default(), BreakSettings::default());
        assert_eq!(session.begin_save_key("   "), Err(ValidationError::EmptyApiKey));
        assert_eq!(session.error(), Some("Veuillez entrer une clé API"));
        assert_eq!(session.begin_save_key("  sk-1 ").unwrap(), "sk-1");

        assert_eq!(session.finish_save_key(Ok(ApiResponse::error("Keyring error: locked"))), Err("Keyring error: locked".into()));
        assert_eq!(session.state(), AppState::Unconfigured);
        session.finish_save_key(Ok(ApiResponse::ok())).unwrap();
        assert_eq!(session.state(), AppState::Ready);
    }

    #[test]
    fn test_generate_requires_key_and_text() {
        let mut session = Session::new(UiLocale::En, "en", VoiceSettings::default(), BreakSettings::default());
        session.set_text("Hello");
        assert_eq!(session.begin_generate().unwrap_err(), ValidationError::NotConfigured);

        let mut session = ready_session();
        session.set_text(" \n\t ");
        assert_eq!(session.begin_generate().unwrap_err(), ValidationError::EmptyText);
        assert_eq!(session.error(), Some("Please enter some text"));
        assert!(!session.is_generating());
    }

    #[test]
    fn test_generate_builds_trimmed_request() {
        let mut session = ready_session();
        session.set_language("FR").unwrap();
        session.set_voice(VoiceParam::Style, 0.4).unwrap();
        session.set_text("  Bonjour.  ");

        let (_, request) = session.begin_generate().unwrap();
        assert_eq!(request.text, "Bonjour.");
        assert_eq!(request.language, "fr");
        assert_eq!(request.voice_settings.map(|v| v.style), Some(0.4));
        assert_eq!(session.begin_generate().unwrap_err(), ValidationError::Busy);
    }

    #[test]
    fn test_generate_results() {
        let mut session = ready_session();
        session.set_text("Hello");

        let (first, _) = session.begin_generate().unwrap();
        assert_eq!(session.finish_generate(first, Ok(ApiResponse::success("QUJD".into()))), GenerateOutcome::Audio("QUJD".into()));
        assert_eq!(session.finish_generate(first, Ok(ApiResponse::success("QUJD".into()))), GenerateOutcome::Stale);

        let (second, _) = session.begin_generate().unwrap();
        let outcome = session.finish_generate(second, Ok(ApiResponse::error("Rate limit exceeded. Please try again later.")));
        assert_eq!(outcome, GenerateOutcome::Failed("Rate limit exceeded. Please try again later.".into()));
        assert_eq!(session.error(), Some("Rate limit exceeded. Please try again later."));

        let (third, _) = session.begin_generate().unwrap();
        assert!(session.error().is_none());
        session.finish_generate(third, Ok(ApiResponse { success: false, data: None, error: None }));
        assert_eq!(session.error(), Some("Failed to generate audio"));

        let (fourth, _) = session.begin_generate().unwrap();
        session.finish_generate(fourth, Err(BridgeError::Transport("bridge unavailable".into())));
        assert_eq!(session.error(), Some("bridge unavailable"));

        let (fifth, _) = session.begin_generate().unwrap();
        session.finish_generate(fifth, Err(BridgeError::Aborted));
        assert_eq!(session.error(), Some("An unexpected error occurred"));
    }

    #[test]
    fn test_text_is_capped() {
        let mut session = ready_session();
        assert!(session.set_text(&"a".repeat(text::MAX_TEXT_LENGTH + 10)));
        assert_eq!(text::char_count(session.text()), text::MAX_TEXT_LENGTH);

        session.set_text("first");
        assert!(!session.append_text("second"));
        assert_eq!(session.text(), "first\nsecond");
    }

    #[test]
    fn test_apply_breaks_on_buffer() {
        let mut session = ready_session();
        session.set_text("Hi. There.");
        assert!(session.apply_breaks());
        assert_eq!(session.text(), r#"Hi<break time="1.0s"/> There<break time="1.0s"/>"#);
        assert!(!session.apply_breaks());

        assert!(session.set_period_break(9.0).is_err());
        assert!(session.set_comma_break(Some(0.5)).is_ok());
        assert_eq!(session.breaks().comma_break, Some(0.5));
    }

    #[test]
    fn test_apply_breaks_near_limit_keeps_every_sentence() {
        let mut session = ready_session();
        let input = "Hi there, it is me. ".repeat(245);
        assert!(!session.set_text(&input));

        assert!(session.apply_breaks());
        assert_eq!(session.text().matches(r#"<break time="1.0s"/>"#).count(), 245);
        assert!(session.text().ends_with(r#"it is me<break time="1.0s"/> "#));
        assert!(text::is_over_limit(session.text()));
        assert!(!session.apply_breaks());

        assert_eq!(session.begin_generate().unwrap_err(), ValidationError::TooLong);
        assert_eq!(session.error(), Some("Text exceeds the 5000 character limit"));
        assert!(!session.is_generating());
    }
}
