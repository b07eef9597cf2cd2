//! Interactive loop.
//!
//! One task owns the session and the player. It selects over stdin, bridge
//! replies, playback events, save-dialog prompts and a periodic tick. Bridge
//! calls run in spawned tasks and report back over a channel, so nothing is
//! mutated outside this loop.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use time::OffsetDateTime;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::commands::{Command, CommandError, HELP};
use super::state::{AppState, GenerateOutcome, RequestId, Session, ValidationError};
use crate::audio::util::format_time;
use crate::audio::{AudioDecoder, Notice, PlaybackController, PlaybackError, PlaybackEvent, PlaybackEventKind, PlaybackState, SaveOutcome, SaveTicket};
use crate::bridge::{BridgeError, BridgeResult, HostBridge, PromptRequest};
use crate::config::languages;
use crate::config::locale::Messages;
use crate::text;

/// Position refresh and notice expiry period.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// A finished bridge call.
pub(crate) enum Reply {
    KeyCheck(BridgeResult<String>),
    KeySaved(BridgeResult<()>),
    Generated(RequestId, BridgeResult<String>),
    Saved(SaveTicket, BridgeResult<String>),
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct Runner<D: AudioDecoder> {
    bridge: Arc<dyn HostBridge>,
    session: Session,
    player: PlaybackController<D>,
    replies_tx: mpsc::UnboundedSender<Reply>,
    replies_rx: mpsc::UnboundedReceiver<Reply>,
    /// Save dialog waiting for the next input line
    pending_prompt: Option<PromptRequest>,
}

impl<D: AudioDecoder> Runner<D> {
    pub fn new(bridge: Arc<dyn HostBridge>, decoder: D, session: Session) -> Self {
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        Self { bridge, session, player: PlaybackController::new(decoder), replies_tx, replies_rx, pending_prompt: None }
    }

    /// Run until `quit`, end of input or an input error.
    pub async fn run<R: AsyncBufRead + Unpin>(
        &mut self,
        input: R,
        mut events: mpsc::UnboundedReceiver<PlaybackEvent>,
        mut prompts: mpsc::Receiver<PromptRequest>,
    ) -> Result<()> {
        let mut lines = input.lines();
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        println!("Type 'help' for commands.");
        self.check_api_key();

        loop {
            tokio::select! {
                line = lines.next_line() => match line.context("Failed to read input")? {
                    Some(line) => {
                        if self.handle_line(&line) == Flow::Quit {
                            break;
                        }
                    }
                    None => {
                        debug!("Input closed");
                        break;
                    }
                },
                Some(reply) = self.replies_rx.recv() => self.handle_reply(reply),
                Some(event) = events.recv() => self.handle_event(event),
                Some(request) = prompts.recv() => self.handle_prompt(request),
                _ = ticker.tick() => self.player.tick(Instant::now()),
            }
        }

        Ok(())
    }

    /// Release audio and abandon any open prompt.
    pub fn shutdown(&mut self) {
        if let Some(prompt) = self.pending_prompt.take() {
            let _ = prompt.reply.send(None);
        }
        self.player.dispose();
    }

    fn messages(&self) -> &'static Messages {
        self.session.messages()
    }

    /// Run a bridge call in its own task and post the result back to the loop.
    fn dispatch<T, F>(&self, call: F, wrap: impl FnOnce(BridgeResult<T>) -> Reply + Send + 'static)
    where
        T: Send + 'static,
        F: Future<Output = BridgeResult<T>> + Send + 'static,
    {
        let replies = self.replies_tx.clone();
        tokio::spawn(async move {
            let result = match tokio::spawn(call).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Bridge task failed: {}", e);
                    Err(BridgeError::Aborted)
                }
            };
            if replies.send(wrap(result)).is_err() {
                debug!("Loop gone, dropping bridge reply");
            }
        });
    }

    fn check_api_key(&self) {
        let bridge = self.bridge.clone();
        self.dispatch(async move { bridge.get_api_key().await }, Reply::KeyCheck);
    }

    fn handle_prompt(&mut self, request: PromptRequest) {
        println!("💾 {} [{}]:", request.question, request.default_filename);
        if let Some(previous) = self.pending_prompt.replace(request) {
            let _ = previous.reply.send(None);
        }
    }

    fn handle_line(&mut self, line: &str) -> Flow {
        if let Some(prompt) = self.pending_prompt.take() {
            let _ = prompt.reply.send(Some(line.to_string()));
            return Flow::Continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(CommandError::Empty) => return Flow::Continue,
            Err(e) => {
                println!("❌ {}", e);
                return Flow::Continue;
            }
        };

        if self.session.state() == AppState::Unconfigured && !command.allowed_unconfigured() {
            println!("🔑 {}", self.messages().api_key_required);
            return Flow::Continue;
        }

        self.execute(command)
    }

    fn execute(&mut self, command: Command) -> Flow {
        let messages = self.messages();
        match command {
            Command::Text(text) => {
                let truncated = self.session.set_text(&text);
                self.report_length(truncated);
            }
            Command::Append(text) => {
                let truncated = self.session.append_text(&text);
                self.report_length(truncated);
            }
            Command::Show => {
                if self.session.text().is_empty() {
                    println!("(empty)");
                } else {
                    println!("{}", self.session.text());
                }
            }
            Command::Clear => self.session.clear_text(),
            Command::Breaks => {
                self.session.apply_breaks();
                println!("✂️  {}", messages.breaks_applied);
                println!("{}", self.session.text());
                self.report_length(false);
            }
            Command::Period(seconds) => {
                let result = self.session.set_period_break(seconds).map(|_| format!("Period pause: {:.1}s", seconds));
                report_validation(result);
            }
            Command::Comma(seconds) => {
                let label = seconds.map_or_else(|| "off".to_string(), |s| format!("{:.1}s", s));
                report_validation(self.session.set_comma_break(seconds).map(|_| format!("Comma pause: {}", label)));
            }
            Command::Lang(code) => report_validation(self.session.set_language(&code).map(|lang| format!("Language: {}", lang.name))),
            Command::Languages => languages::print_languages(),
            Command::Voice(None) => {
                let voice = self.session.voice();
                println!("stability {:.2}, similarity {:.2}, style {:.2}", voice.stability, voice.similarity_boost, voice.style);
            }
            Command::Voice(Some((param, value))) => report_validation(self.session.set_voice(param, value).map(|_| format!("{:?}: {:.2}", param, value))),
            Command::Generate => self.generate(),
            Command::Play => {
                let result = self.player.play();
                self.report_playback(result);
            }
            Command::Pause => {
                let result = self.player.pause();
                self.report_playback(result);
            }
            Command::Stop => {
                let result = self.player.stop();
                self.report_playback(result);
            }
            Command::Seek(seconds) => match self.player.seek(seconds) {
                Ok(position) => println!("⏩ {} / {}", format_time(position), format_time(self.player.duration())),
                Err(e) => self.report_playback(Err(e)),
            },
            Command::Save => self.save(),
            Command::Key(raw) => {
                if let Ok(key) = self.session.begin_save_key(&raw) {
                    let bridge = self.bridge.clone();
                    self.dispatch(async move { bridge.set_api_key(key).await }, Reply::KeySaved);
                } else {
                    println!("❌ {}", messages.enter_api_key);
                }
            }
            Command::Status => self.print_status(),
            Command::Dismiss => {
                self.session.dismiss_error();
                self.player.dismiss_notice();
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn generate(&mut self) {
        let messages = self.messages();
        match self.session.begin_generate() {
            Ok((id, request)) => {
                self.player.clear();
                println!("⏳ {}", messages.generating);
                let bridge = self.bridge.clone();
                self.dispatch(async move { bridge.generate_tts(request).await }, move |result| Reply::Generated(id, result));
            }
            Err(ValidationError::Busy) => println!("⏳ {}", messages.generation_busy),
            Err(ValidationError::NotConfigured) => println!("🔑 {}", messages.api_key_required),
            Err(e) => println!("❌ {}", self.session.error().map(str::to_string).unwrap_or_else(|| e.to_string())),
        }
    }

    fn save(&mut self) {
        let messages = self.messages();
        match self.player.begin_save(OffsetDateTime::now_utc()) {
            Ok(ticket) => {
                println!("⏳ {}", messages.saving);
                let bridge = self.bridge.clone();
                let request = ticket.request.clone();
                self.dispatch(async move { bridge.save_audio_file(request).await }, move |result| Reply::Saved(ticket, result));
            }
            Err(PlaybackError::SaveInFlight) => println!("⏳ {}", messages.save_busy),
            Err(PlaybackError::NothingLoaded) => println!("🔇 {}", messages.no_audio),
            Err(e) => println!("❌ {}", e),
        }
    }

    fn handle_reply(&mut self, reply: Reply) {
        let messages = self.messages();
        match reply {
            Reply::KeyCheck(result) => match self.session.apply_key_check(result) {
                AppState::Ready => println!("✅ Ready. Language: {}", self.session.language().name),
                AppState::Unconfigured => println!("🔑 {}", messages.api_key_required),
            },
            Reply::KeySaved(result) => match self.session.finish_save_key(result) {
                Ok(()) => {
                    println!("✅ {}", messages.api_key_saved);
                    self.check_api_key();
                }
                Err(message) => println!("❌ {}", message),
            },
            Reply::Generated(id, result) => match self.session.finish_generate(id, result) {
                GenerateOutcome::Audio(audio) => match self.player.load(&audio) {
                    Ok(_) => println!("🔊 Audio ready: play | pause | stop | seek | save"),
                    Err(PlaybackError::Output(message)) => {
                        println!("⚠️  {}", message);
                        println!("💾 {}", messages.output_unavailable);
                    }
                    Err(e) => println!("❌ {}", e),
                },
                GenerateOutcome::Failed(message) => println!("❌ {}", message),
                GenerateOutcome::Stale => {}
            },
            Reply::Saved(ticket, result) => match self.player.complete_save(ticket, result, Instant::now()) {
                SaveOutcome::Saved(_) | SaveOutcome::Failed => self.print_notice(),
                SaveOutcome::Cancelled | SaveOutcome::Discarded => {}
            },
        }
    }

    fn handle_event(&mut self, event: PlaybackEvent) {
        let kind = event.kind.clone();
        if !self.player.handle_event(event) {
            return;
        }
        match kind {
            PlaybackEventKind::DurationChanged(seconds) => debug!("Duration: {}", format_time(seconds)),
            PlaybackEventKind::Ended => println!("⏹️  Finished ({})", format_time(self.player.duration())),
            PlaybackEventKind::Error(_) => self.print_notice(),
        }
    }

    fn print_notice(&self) {
        if let Some(active) = self.player.notice() {
            let icon = if active.notice.is_success() { "✅" } else { "❌" };
            println!("{} {}", icon, render_notice(&active.notice, self.messages()));
        }
    }

    fn print_status(&self) {
        let breaks = self.session.breaks();
        let voice = self.session.voice();
        let chars = text::char_count(self.session.text());

        println!("State:     {:?}", self.session.state());
        println!("Language:  {} ({})", self.session.language().name, self.session.language().code);
        println!("Voice:     stability {:.2}, similarity {:.2}, style {:.2}", voice.stability, voice.similarity_boost, voice.style);
        println!(
            "Pauses:    period {:.1}s, comma {}",
            breaks.period_break,
            breaks.comma_break.map_or_else(|| "off".to_string(), |s| format!("{:.1}s", s))
        );
        println!("Text:      {} / {} characters", chars, text::MAX_TEXT_LENGTH);
        if self.session.is_generating() {
            println!("Generate:  {}", self.messages().generating);
        }
        if let Some(error) = self.session.error() {
            println!("Error:     {}", error);
        }
        println!("Player:    {} {} / {}", self.player.state(), format_time(self.player.position()), format_time(self.player.duration()));
        if self.player.is_saving() {
            println!("Save:      {}", self.messages().saving);
        }
        self.print_notice();
    }

    fn report_length(&self, truncated: bool) {
        let text = self.session.text();
        println!("📝 {} / {} characters", text::char_count(text), text::MAX_TEXT_LENGTH);
        if let Some(warning) = length_warning(text, truncated, self.messages()) {
            println!("⚠️  {}", warning);
        }
    }

    fn report_playback(&self, result: Result<(), PlaybackError>) {
        match result {
            Ok(()) => debug!("Player: {}", self.player.state()),
            Err(_) if self.player.state() == PlaybackState::Idle && self.player.has_artifact() => {
                println!("🔇 {}", self.messages().output_unavailable)
            }
            Err(_) if self.player.state() == PlaybackState::Idle => println!("🔇 {}", self.messages().no_audio),
            Err(e) => println!("⚠️  {}", e),
        }
    }
}

fn report_validation(result: Result<String, ValidationError>) {
    match result {
        Ok(message) => println!("{}", message),
        Err(e) => println!("❌ {}", e),
    }
}

/// Warning for the buffer length, if any. Truncation wins over the limit checks.
fn length_warning(text: &str, truncated: bool, messages: &'static Messages) -> Option<&'static str> {
    if truncated {
        Some(messages.text_truncated)
    } else if text::is_over_limit(text) {
        Some(messages.text_too_long)
    } else if text::is_near_limit(text) {
        Some(messages.near_limit)
    } else {
        None
    }
}

/// Text for a player notice in the session's locale.
pub fn render_notice(notice: &Notice, messages: &Messages) -> String {
    match notice {
        Notice::Saved => messages.file_saved.to_string(),
        Notice::SaveFailed(message) => message.clone().unwrap_or_else(|| messages.file_save_failed.to_string()),
        Notice::Unexpected(message) => message.clone().unwrap_or_else(|| messages.unexpected_error.to_string()),
        Notice::PlaybackFailed(message) => message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::audio::{PlayableSource, SourceId};
    use crate::bridge::{ApiResponse, GenerateTtsRequest, SAVE_CANCELLED, SaveAudioRequest, VoiceSettings};
    use crate::config::locale::UiLocale;
    use crate::text::BreakSettings;

    /// Bridge with a settable key and canned synthesis output.
    #[derive(Default)]
    struct FakeBridge {
        key: Mutex<Option<String>>,
        generated: Mutex<Vec<GenerateTtsRequest>>,
        saves: Mutex<Vec<SaveAudioRequest>>,
        cancel_saves: bool,
    }

    #[async_trait]
    impl HostBridge for FakeBridge {
        async fn get_api_key(&self) -> BridgeResult<String> {
            Ok(match self.key.lock().clone() {
                Some(key) => ApiResponse::success(key),
                None => ApiResponse::ok(),
            })
        }

        async fn set_api_key(&self, api_key: String) -> BridgeResult<()> {
            *self.key.lock() = Some(api_key);
            Ok(ApiResponse::ok())
        }

        async fn generate_tts(&self, request: GenerateTtsRequest) -> BridgeResult<String> {
            self.generated.lock().push(request);
            Ok(ApiResponse::success("SUQz".to_string()))
        }

        async fn save_audio_file(&self, request: SaveAudioRequest) -> BridgeResult<String> {
            self.saves.lock().push(request);
            if self.cancel_saves {
                Ok(ApiResponse::error(SAVE_CANCELLED))
            } else {
                Ok(ApiResponse::success("File saved successfully: /tmp/out.mp3".to_string()))
            }
        }
    }

    struct SilentDecoder(u64);

    struct SilentSource(SourceId);

    impl AudioDecoder for SilentDecoder {
        fn decode(&mut self, _bytes: &[u8]) -> Result<Box<dyn PlayableSource>, PlaybackError> {
            self.0 += 1;
            Ok(Box::new(SilentSource(SourceId(self.0))))
        }
    }

    impl PlayableSource for SilentSource {
        fn id(&self) -> SourceId {
            self.0
        }
        fn play(&mut self) -> Result<(), PlaybackError> {
            Ok(())
        }
        fn pause(&mut self) {}
        fn seek(&mut self, _seconds: f64) {}
        fn position(&self) -> f64 {
            0.0
        }
        fn release(&mut self) {}
    }

    fn runner(bridge: Arc<FakeBridge>) -> Runner<SilentDecoder> {
        let session = Session::new(UiLocale::En, "en", VoiceSettings::default(), BreakSettings::default());
        Runner::new(bridge, SilentDecoder(0), session)
    }

    async fn pump(runner: &mut Runner<SilentDecoder>) {
        let reply = runner.replies_rx.recv().await.unwrap();
        runner.handle_reply(reply);
    }

    #[tokio::test]
    async fn test_unconfigured_until_key_is_stored() {
        let bridge = Arc::new(FakeBridge::default());
        let mut runner = runner(bridge.clone());

        runner.check_api_key();
        pump(&mut runner).await;
        assert_eq!(runner.session.state(), AppState::Unconfigured);

        runner.handle_line("text Hello.");
        assert_eq!(runner.session.text(), "");

        runner.handle_line("key   sk-live  ");
        pump(&mut runner).await; // stored
        pump(&mut runner).await; // re-checked
        assert_eq!(runner.session.state(), AppState::Ready);
        assert_eq!(bridge.key.lock().as_deref(), Some("sk-live"));
    }

    #[tokio::test]
    async fn test_generate_loads_audio_and_saves() {
        let bridge = Arc::new(FakeBridge { key: Mutex::new(Some("sk".into())), ..Default::default() });
        let mut runner = runner(bridge.clone());
        runner.check_api_key();
        pump(&mut runner).await;

        runner.handle_line("text Hello. World.");
        runner.handle_line("breaks");
        runner.handle_line("lang es");
        runner.handle_line("generate");
        assert!(runner.session.is_generating());
        pump(&mut runner).await;

        assert_eq!(runner.player.state(), PlaybackState::Loaded);
        let sent = bridge.generated.lock().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].language, "es");
        assert!(sent[0].text.contains(r#"<break time="1.0s"/>"#));

        runner.handle_line("save");
        assert!(runner.player.is_saving());
        pump(&mut runner).await;
        assert!(!runner.player.is_saving());
        assert_eq!(runner.player.notice().map(|n| n.notice.clone()), Some(Notice::Saved));
        assert_eq!(bridge.saves.lock()[0].base64_audio, "SUQz");
        assert!(runner.handle_line("quit") == Flow::Quit);
    }

    #[tokio::test]
    async fn test_breaks_past_limit_keep_text_and_block_generate() {
        let bridge = Arc::new(FakeBridge { key: Mutex::new(Some("sk".into())), ..Default::default() });
        let mut runner = runner(bridge.clone());
        runner.check_api_key();
        pump(&mut runner).await;

        runner.handle_line(&format!("text {}", "Hi there, it is me. ".repeat(245)));
        runner.handle_line("breaks");
        assert_eq!(runner.session.text().matches(r#"<break time="1.0s"/>"#).count(), 245);

        runner.handle_line("generate");
        assert!(!runner.session.is_generating());
        assert_eq!(runner.session.error(), Some("Text exceeds the 5000 character limit"));
        assert!(bridge.generated.lock().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_save_is_silent() {
        let bridge = Arc::new(FakeBridge { key: Mutex::new(Some("sk".into())), cancel_saves: true, ..Default::default() });
        let mut runner = runner(bridge);
        runner.check_api_key();
        pump(&mut runner).await;

        runner.handle_line("text Hi");
        runner.handle_line("generate");
        pump(&mut runner).await;
        runner.handle_line("save");
        pump(&mut runner).await;
        assert!(runner.player.notice().is_none());
    }

    #[tokio::test]
    async fn test_prompt_consumes_next_line() {
        let mut runner = runner(Arc::new(FakeBridge::default()));
        let (reply, answer) = tokio::sync::oneshot::channel();
        runner.handle_prompt(PromptRequest { question: "Save as".into(), default_filename: "a.mp3".into(), reply });

        assert_eq!(runner.handle_line("quit"), Flow::Continue);
        assert_eq!(answer.await.unwrap().as_deref(), Some("quit"));
    }

    #[test]
    fn test_length_warnings() {
        let messages = UiLocale::En.messages();
        assert_eq!(length_warning("short", false, messages), None);
        assert_eq!(length_warning(&"a".repeat(4600), false, messages), Some("Approaching the character limit"));
        assert_eq!(length_warning(&"a".repeat(5000), true, messages), Some("Character limit reached, the end of the text was cut"));
        assert_eq!(length_warning(&"a".repeat(5001), false, messages), Some("Text exceeds the 5000 character limit"));
    }

    #[test]
    fn test_render_notice_fallbacks() {
        let messages = UiLocale::En.messages();
        assert_eq!(render_notice(&Notice::SaveFailed(None), messages), "Failed to save file");
        assert_eq!(render_notice(&Notice::Unexpected(Some("boom".into())), messages), "boom");
        assert_eq!(render_notice(&Notice::Saved, UiLocale::Fr.messages()), "Fichier enregistré avec succès !");
    }
}
