//! One-shot mode: synthesize the given text, then save and/or play it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::runner::render_notice;
use super::state::{AppState, GenerateOutcome, Session, transport_message};
use crate::audio::{AudioDecoder, PlaybackController, PlaybackEvent, PlaybackState, default_filename};
use crate::bridge::{HostBridge, SaveAudioRequest};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub text: String,
    pub apply_breaks: bool,
    /// Save destination; the bridge's save dialog is expected to answer it.
    pub output: Option<PathBuf>,
    pub play: bool,
}

/// Run one synthesis. Any failure is returned as an error with the message
/// the interactive mode would have shown.
pub async fn run_batch<D: AudioDecoder>(
    bridge: Arc<dyn HostBridge>,
    decoder: D,
    mut events: mpsc::UnboundedReceiver<PlaybackEvent>,
    mut session: Session,
    options: BatchOptions,
) -> Result<()> {
    let messages = session.messages();

    if session.apply_key_check(bridge.get_api_key().await) == AppState::Unconfigured {
        bail!("{}", messages.api_key_required);
    }

    if session.set_text(&options.text) {
        warn!("Text truncated to {} characters", crate::text::MAX_TEXT_LENGTH);
    }
    if options.apply_breaks && session.apply_breaks() {
        debug!("Text with pauses: {}", session.text());
        if crate::text::is_over_limit(session.text()) {
            warn!("{}", messages.text_too_long);
        }
    }

    let (id, request) = match session.begin_generate() {
        Ok(started) => started,
        Err(e) => bail!("{}", session.error().map(str::to_string).unwrap_or_else(|| e.to_string())),
    };

    let audio = match session.finish_generate(id, bridge.generate_tts(request).await) {
        GenerateOutcome::Audio(audio) => audio,
        GenerateOutcome::Failed(message) => bail!("{}", message),
        GenerateOutcome::Stale => bail!("{}", messages.unexpected_error),
    };
    info!("🔊 Received {} bytes of base64 audio", audio.len());

    if let Some(ref output) = options.output {
        let request = SaveAudioRequest { base64_audio: audio.clone(), default_filename: default_filename(OffsetDateTime::now_utc()) };
        match bridge.save_audio_file(request).await {
            Ok(response) if response.success => println!("💾 {}", response.data.unwrap_or_else(|| output.display().to_string())),
            Ok(response) if response.is_cancelled() => debug!("Save cancelled"),
            Ok(response) => bail!("{}", response.error.unwrap_or_else(|| messages.file_save_failed.to_string())),
            Err(e) => bail!("{}", transport_message(&e, messages)),
        }
    }

    if options.play {
        let mut player = PlaybackController::new(decoder);
        player.load(&audio)?;
        player.play()?;
        info!("▶️  Playing");

        while let Some(event) = events.recv().await {
            player.handle_event(event);
            match player.state() {
                PlaybackState::Loaded => break,
                PlaybackState::Paused => {
                    let message = player.notice().map(|n| render_notice(&n.notice, messages)).unwrap_or_default();
                    player.dispose();
                    bail!("Playback failed: {}", message);
                }
                _ => {}
            }
        }
        player.dispose();
        info!("⏹️  Playback finished");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::audio::{PlayableSource, PlaybackError, PlaybackEventKind, SourceId};
    use crate::bridge::{ApiResponse, BridgeResult, GenerateTtsRequest, VoiceSettings};
    use crate::config::locale::UiLocale;
    use crate::text::BreakSettings;

    struct ScriptedBridge {
        key: Option<String>,
        generate: ApiResponse<String>,
        requests: Mutex<Vec<GenerateTtsRequest>>,
        saves: Mutex<Vec<SaveAudioRequest>>,
    }

    impl ScriptedBridge {
        fn new(key: Option<&str>, generate: ApiResponse<String>) -> Self {
            Self { key: key.map(str::to_string), generate, requests: Mutex::new(Vec::new()), saves: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl HostBridge for ScriptedBridge {
        async fn get_api_key(&self) -> BridgeResult<String> {
            Ok(self.key.clone().map(ApiResponse::success).unwrap_or_else(ApiResponse::ok))
        }

        async fn set_api_key(&self, _api_key: String) -> BridgeResult<()> {
            Ok(ApiResponse::ok())
        }

        async fn generate_tts(&self, request: GenerateTtsRequest) -> BridgeResult<String> {
            self.requests.lock().push(request);
            Ok(self.generate.clone())
        }

        async fn save_audio_file(&self, request: SaveAudioRequest) -> BridgeResult<String> {
            self.saves.lock().push(request);
            Ok(ApiResponse::success("File saved successfully: /tmp/batch.mp3".to_string()))
        }
    }

    /// Decoder whose sources finish immediately when played.
    struct EndingDecoder(mpsc::UnboundedSender<PlaybackEvent>);

    struct EndingSource(SourceId, mpsc::UnboundedSender<PlaybackEvent>);

    impl AudioDecoder for EndingDecoder {
        fn decode(&mut self, _bytes: &[u8]) -> Result<Box<dyn PlayableSource>, PlaybackError> {
            let id = SourceId(1);
            let _ = self.0.send(PlaybackEvent::new(id, PlaybackEventKind::DurationChanged(1.5)));
            Ok(Box::new(EndingSource(id, self.0.clone())))
        }
    }

    impl PlayableSource for EndingSource {
        fn id(&self) -> SourceId {
            self.0
        }
        fn play(&mut self) -> Result<(), PlaybackError> {
            let _ = self.1.send(PlaybackEvent::new(self.0, PlaybackEventKind::Ended));
            Ok(())
        }
        fn pause(&mut self) {}
        fn seek(&mut self, _seconds: f64) {}
        fn position(&self) -> f64 {
            0.0
        }
        fn release(&mut self) {}
    }

    fn session() -> Session {
        Session::new(UiLocale::En, "de", VoiceSettings::default(), BreakSettings::default())
    }

    fn options(text: &str) -> BatchOptions {
        BatchOptions { text: text.to_string(), apply_breaks: true, output: Some(PathBuf::from("/tmp/batch.mp3")), play: true }
    }

    #[tokio::test]
    async fn test_batch_generates_saves_and_plays() {
        let bridge = Arc::new(ScriptedBridge::new(Some("sk"), ApiResponse::success("SUQz".into())));
        let (tx, rx) = mpsc::unbounded_channel();

        run_batch(bridge.clone(), EndingDecoder(tx), rx, session(), options("Guten Tag. Tschüss.")).await.unwrap();

        let requests = bridge.requests.lock();
        assert_eq!(requests[0].language, "de");
        assert_eq!(requests[0].text, r#"Guten Tag<break time="1.0s"/> Tschüss<break time="1.0s"/>"#);
        let saves = bridge.saves.lock();
        assert_eq!(saves[0].base64_audio, "SUQz");
        assert!(saves[0].default_filename.starts_with("voicedesk-"));
    }

    #[tokio::test]
    async fn test_batch_requires_a_key() {
        let bridge = Arc::new(ScriptedBridge::new(None, ApiResponse::success("SUQz".into())));
        let (tx, rx) = mpsc::unbounded_channel();

        let err = run_batch(bridge.clone(), EndingDecoder(tx), rx, session(), options("Hallo")).await.unwrap_err();
        assert!(err.to_string().contains("API key is required"));
        assert!(bridge.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_batch_reports_provider_error_verbatim() {
        let bridge = Arc::new(ScriptedBridge::new(Some("sk"), ApiResponse::error("Invalid API key. Please check your settings.")));
        let (tx, rx) = mpsc::unbounded_channel();

        let err = run_batch(bridge, EndingDecoder(tx), rx, session(), options("Hallo")).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid API key. Please check your settings.");
    }

    #[tokio::test]
    async fn test_batch_rejects_blank_text() {
        let bridge = Arc::new(ScriptedBridge::new(Some("sk"), ApiResponse::success("SUQz".into())));
        let (tx, rx) = mpsc::unbounded_channel();

        let err = run_batch(bridge.clone(), EndingDecoder(tx), rx, session(), options("   ")).await.unwrap_err();
        assert_eq!(err.to_string(), "Please enter some text");
        assert!(bridge.requests.lock().is_empty());
    }
}
