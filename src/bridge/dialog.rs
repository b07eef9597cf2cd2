//! Save dialogs: where `save_audio_file` writes, or whether it is cancelled.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Asks the user for a destination file.
#[async_trait]
pub trait SaveDialog: Send + Sync {
    /// The chosen path, or `None` when the user cancels.
    async fn choose_path(&self, default_filename: &str) -> Option<PathBuf>;
}

/// Dialog that always answers the same path (batch mode).
pub struct FixedPathDialog {
    path: PathBuf,
}

impl FixedPathDialog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SaveDialog for FixedPathDialog {
    async fn choose_path(&self, _default_filename: &str) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

/// A question routed to whoever owns the terminal.
#[derive(Debug)]
pub struct PromptRequest {
    pub question: String,
    pub default_filename: String,
    /// `None` when the prompt was abandoned.
    pub reply: oneshot::Sender<Option<String>>,
}

/// Dialog that asks through the interactive loop, which owns stdin.
pub struct PromptSaveDialog {
    output_dir: PathBuf,
    question: &'static str,
    prompts: mpsc::Sender<PromptRequest>,
}

impl PromptSaveDialog {
    pub fn new(output_dir: impl Into<PathBuf>, question: &'static str, prompts: mpsc::Sender<PromptRequest>) -> Self {
        Self { output_dir: output_dir.into(), question, prompts }
    }
}

#[async_trait]
impl SaveDialog for PromptSaveDialog {
    async fn choose_path(&self, default_filename: &str) -> Option<PathBuf> {
        let (reply, answer) = oneshot::channel();
        let request = PromptRequest { question: self.question.to_string(), default_filename: default_filename.to_string(), reply };

        if self.prompts.send(request).await.is_err() {
            debug!("Prompt channel closed, treating save as cancelled");
            return None;
        }

        let answer = answer.await.ok().flatten()?;
        resolve_answer(&self.output_dir, default_filename, &answer)
    }
}

/// Map a typed answer to a path: empty keeps the default name, `-` cancels,
/// relative paths land in `output_dir`.
///
/// # Returns
/// The destination, or `None` when the user cancelled
pub fn resolve_answer(output_dir: &Path, default_filename: &str, answer: &str) -> Option<PathBuf> {
    match answer.trim() {
        "" => Some(output_dir.join(default_filename)),
        "-" => None,
        name => {
            let path = PathBuf::from(name);
            Some(if path.is_absolute() { path } else { output_dir.join(path) })
        }
    }
}
