//! VoiceDesk - a terminal desk for ElevenLabs text-to-speech.
//!
//! Type or load text, insert pause markers, synthesize speech through the
//! ElevenLabs API, then play back and save the resulting audio. The API key
//! lives in the OS keyring.

mod app;
mod audio;
mod bridge;
mod config;
mod text;

use std::sync::Arc;

use anyhow::Result;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

use app::{BatchOptions, Runner, Session};
use audio::CpalEngine;
use bridge::{CredentialStore, FixedPathDialog, HostBridge, KeyringStore, NativeBridge, PromptSaveDialog, SaveDialog, SpeechClient};
use config::AppConfig;

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("🛑 Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("🛑 Received SIGTERM, shutting down...");
        }
    }
}

/// Store the key given with `--set-api-key` and report the outcome.
async fn store_api_key(bridge: &dyn HostBridge, api_key: &str, config: &AppConfig) -> Result<()> {
    let messages = config.ui_locale.messages();
    match bridge.set_api_key(api_key.to_string()).await {
        Ok(response) if response.success => {
            println!("✅ {}", messages.api_key_saved);
            Ok(())
        }
        Ok(response) => anyhow::bail!("{}", response.error.unwrap_or_else(|| messages.api_key_save_failed.to_string())),
        Err(e) => anyhow::bail!("{}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let config = AppConfig::from_args();

    // Respect RUST_LOG env var, fallback to verbose flag, default to info
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(if config.verbose { "debug" } else { "info" }))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(LocalTime::new(time::macros::format_description!("[hour]:[minute]:[second]")))
        .init();

    info!("🗣️  VoiceDesk v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate() {
        error!("❌ Configuration error: {:#}", e);
        std::process::exit(1);
    }

    let credentials: Arc<dyn CredentialStore> = Arc::new(KeyringStore::default());
    let speech = SpeechClient::new(config.speech_client_config())?;
    let messages = config.ui_locale.messages();

    let (prompts_tx, prompts_rx) = mpsc::channel(1);
    let dialog: Box<dyn SaveDialog> = match config.output {
        Some(ref output) => Box::new(FixedPathDialog::new(output.clone())),
        None => Box::new(PromptSaveDialog::new(config.output_dir.clone(), messages.save_prompt, prompts_tx)),
    };
    let bridge: Arc<dyn HostBridge> = Arc::new(NativeBridge::new(credentials, speech, dialog));

    if let Some(ref api_key) = config.set_api_key {
        if let Err(e) = store_api_key(bridge.as_ref(), api_key, &config).await {
            error!("❌ {:#}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    config.log_config();

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let engine = CpalEngine::new(events_tx);
    let session = Session::new(config.ui_locale, &config.language, config.voice_settings(), config.break_settings()?);

    if let Some(text) = config.batch_text()? {
        let options = BatchOptions { text, apply_breaks: config.apply_breaks, output: config.output.clone(), play: config.play };

        tokio::select! {
            result = app::run_batch(bridge, engine, events_rx, session, options) => {
                if let Err(e) = result {
                    error!("❌ {:#}", e);
                    std::process::exit(1);
                }
            }
            _ = wait_for_shutdown() => {}
        }
    } else {
        let mut runner = Runner::new(bridge, engine, session);
        let input = BufReader::new(tokio::io::stdin());

        tokio::select! {
            result = runner.run(input, events_rx, prompts_rx) => result?,
            _ = wait_for_shutdown() => {}
        }

        runner.shutdown();
    }

    info!("✅ VoiceDesk stopped");
    Ok(())
}
