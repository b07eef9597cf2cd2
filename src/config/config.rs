//! Application configuration and CLI argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::languages::{self, parse_language};
use super::locale::UiLocale;
use crate::bridge::types::parse_voice_value;
use crate::bridge::{SpeechClientConfig, VoiceSettings};
use crate::text::BreakSettings;
use crate::text::breaks::{DEFAULT_PERIOD_BREAK, parse_comma_break, parse_period_break};

/// VoiceDesk configuration.
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "voicedesk")]
#[command(author, version, about = "Text-to-speech desk for ElevenLabs voices", long_about = None)]
pub struct AppConfig {
    /// List the synthesis languages and exit
    #[arg(long)]
    pub list_languages: bool,

    /// Store the ElevenLabs API key in the OS keyring and exit
    #[arg(long, value_name = "API_KEY")]
    pub set_api_key: Option<String>,

    /// ElevenLabs API base URL
    #[arg(long, env = "ELEVENLABS_API_URL", default_value = "https://api.elevenlabs.io")]
    pub api_url: String,

    /// Voice used for synthesis
    #[arg(long, env = "ELEVENLABS_VOICE_ID", default_value = "podfxsRIe2hbXsMfBAMz")]
    pub voice_id: String,

    /// Synthesis model
    #[arg(long, default_value = "eleven_multilingual_v2")]
    pub model_id: String,

    /// Audio encoding requested from the API
    #[arg(long, default_value = "mp3_44100_128")]
    pub output_format: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "60")]
    pub timeout_secs: u64,

    /// Send the selected language as `language_code` (for models that accept it)
    #[arg(long)]
    pub send_language_code: bool,

    /// Synthesis language code (en, es, fr, de, it, ar)
    #[arg(long, short = 'l', default_value = "en", value_parser = parse_language)]
    pub language: String,

    /// Voice stability (0.0 - 1.0)
    #[arg(long, default_value = "0.5", value_parser = parse_voice_value)]
    pub stability: f32,

    /// Voice similarity boost (0.0 - 1.0)
    #[arg(long, default_value = "0.75", value_parser = parse_voice_value)]
    pub similarity_boost: f32,

    /// Voice style exaggeration (0.0 - 1.0)
    #[arg(long, default_value = "0.0", value_parser = parse_voice_value)]
    pub style: f32,

    /// Pause inserted for periods, in seconds (1.0 - 8.0)
    #[arg(long, default_value_t = DEFAULT_PERIOD_BREAK, value_parser = parse_period_break)]
    pub period_break: f64,

    /// Pause inserted for commas, in seconds (0.1 - 0.9); commas are kept when unset
    #[arg(long, value_parser = parse_comma_break)]
    pub comma_break: Option<f64>,

    /// Text to synthesize once (batch mode)
    #[arg(long, short = 't', conflicts_with = "text_file")]
    pub text: Option<String>,

    /// File with text to synthesize once (batch mode)
    #[arg(long, short = 'f')]
    pub text_file: Option<PathBuf>,

    /// Insert pause markers before synthesizing (batch mode)
    #[arg(long)]
    pub apply_breaks: bool,

    /// Where to save the audio (batch mode)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Play the audio to the end (batch mode)
    #[arg(long)]
    pub play: bool,

    /// Directory for saved audio in interactive mode
    #[arg(long, env = "VOICEDESK_OUTPUT_DIR", default_value_os_t = default_output_dir())]
    pub output_dir: PathBuf,

    /// Language of the interface messages
    #[arg(long, value_enum, default_value = "en")]
    pub ui_locale: UiLocale,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl AppConfig {
    /// Parse configuration from command line arguments.
    pub fn from_args() -> Self {
        let config = Self::parse();

        if config.list_languages {
            languages::print_languages();
            std::process::exit(0);
        }

        config
    }

    /// True when text was given on the command line.
    pub fn is_batch(&self) -> bool {
        self.text.is_some() || self.text_file.is_some()
    }

    /// Text for batch mode, read from `--text` or `--text-file`.
    pub fn batch_text(&self) -> Result<Option<String>> {
        if let Some(ref text) = self.text {
            return Ok(Some(text.clone()));
        }
        match self.text_file {
            Some(ref path) => {
                let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read text file: {}", path.display()))?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    pub fn voice_settings(&self) -> VoiceSettings {
        VoiceSettings { stability: self.stability, similarity_boost: self.similarity_boost, style: self.style }
    }

    pub fn break_settings(&self) -> Result<BreakSettings> {
        Ok(BreakSettings::new(self.period_break, self.comma_break)?)
    }

    pub fn speech_client_config(&self) -> SpeechClientConfig {
        SpeechClientConfig {
            api_url: self.api_url.clone(),
            voice_id: self.voice_id.clone(),
            model_id: self.model_id.clone(),
            output_format: self.output_format.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            send_language_code: self.send_language_code,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            anyhow::bail!("API URL must start with http:// or https://, got {}", self.api_url);
        }

        if self.voice_id.trim().is_empty() {
            anyhow::bail!("Voice ID must not be empty");
        }

        if self.timeout_secs == 0 {
            anyhow::bail!("Timeout must be at least one second");
        }

        if !self.is_batch() && (self.output.is_some() || self.play || self.apply_breaks) {
            anyhow::bail!("--output, --play and --apply-breaks need --text or --text-file");
        }

        if let Some(ref path) = self.text_file
            && !path.is_file()
        {
            anyhow::bail!("Text file does not exist: {}", path.display());
        }

        self.break_settings()?;

        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Configuration:");
        info!("  API URL: {}", self.api_url);
        info!("  Voice: {}", self.voice_id);
        info!("  Model: {} ({})", self.model_id, self.output_format);
        info!("  Language: {}{}", self.language, if self.send_language_code { " (sent as language_code)" } else { "" });
        info!("  Voice settings: stability={}, similarity_boost={}, style={}", self.stability, self.similarity_boost, self.style);
        match self.comma_break {
            Some(comma) => info!("  Pauses: period {:.1}s, comma {:.1}s", self.period_break, comma),
            None => info!("  Pauses: period {:.1}s", self.period_break),
        }
        info!("  UI locale: {}", self.ui_locale);
        if self.is_batch() {
            if let Some(ref output) = self.output {
                info!("  Output: {}", output.display());
            }
            info!("  Play: {}", self.play);
        } else {
            info!("  Output directory: {}", self.output_dir.display());
        }
    }
}

/// Get the default output directory (~/VoiceDesk).
fn default_output_dir() -> PathBuf {
    if let Some(home_dir) = dirs::home_dir() {
        home_dir.join("VoiceDesk")
    } else {
        PathBuf::from(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn try_parse(args: &[&str]) -> Result<AppConfig, clap::Error> {
        AppConfig::try_parse_from(std::iter::once("voicedesk").chain(args.iter().copied()))
    }

    fn parse(args: &[&str]) -> AppConfig {
        try_parse(args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.language, "en");
        assert_eq!(config.period_break, 1.0);
        assert_eq!(config.comma_break, None);
        assert_eq!(config.voice_settings(), VoiceSettings::default());
        assert_eq!(config.ui_locale, UiLocale::En);
        assert!(!config.is_batch());
        config.validate().unwrap();
    }

    #[test]
    fn test_ranges_are_checked_by_the_parser() {
        assert!(try_parse(&["--period-break", "0.5"]).is_err());
        assert!(try_parse(&["--comma-break", "1.0"]).is_err());
        assert!(try_parse(&["--stability", "1.5"]).is_err());
        assert!(try_parse(&["--language", "pt"]).is_err());
        assert!(try_parse(&["--text", "a", "--text-file", "b.txt"]).is_err());
    }

    #[test]
    fn test_batch_flags_need_text() {
        assert!(parse(&["--play"]).validate().is_err());
        let config = parse(&["-t", "Hola.", "-l", "ES", "--play", "--comma-break", "0.4"]);
        config.validate().unwrap();
        assert_eq!(config.language, "es");
        assert_eq!(config.batch_text().unwrap().as_deref(), Some("Hola."));
        assert_eq!(config.break_settings().unwrap().comma_break, Some(0.4));
    }

    #[test]
    fn test_speech_client_config() {
        let config = parse(&["--api-url", "http://localhost:9000", "--timeout-secs", "5", "--send-language-code"]);
        let speech = config.speech_client_config();
        assert_eq!(speech.api_url, "http://localhost:9000");
        assert_eq!(speech.timeout, Duration::from_secs(5));
        assert!(speech.send_language_code);
        assert!(parse(&["--api-url", "ftp://x"]).validate().is_err());
    }
}
