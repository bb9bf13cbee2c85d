//! Speech recognizer capability interface
//!
//! The portal's fallback call path transcribes speech locally and sends text
//! to the dialogue backend. Platform recognizers are host-provided, so the
//! coordinator only sees this narrow interface; `LineRecognizer` covers the
//! terminal chat mode, and tests script their own implementations.

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum RecognizerError {
    /// No local speech recognition on this platform; the session must not
    /// start on the recognizer path
    #[error("speech recognition is not available in this environment")]
    Unsupported,

    #[error("recognizer error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// A recognized utterance
    Transcript(String),
    /// The recognizer shut down on its own
    Ended,
}

/// Continuous recognizer: `start` yields a transcript event stream, `stop`
/// suspends it. Starting again after a stop resumes recognition.
#[async_trait::async_trait]
pub trait Recognizer: Send {
    async fn start(&mut self) -> Result<mpsc::Receiver<RecognizerEvent>, RecognizerError>;

    async fn stop(&mut self);
}

/// Terminal "recognizer": each stdin line becomes one utterance.
///
/// This powers the text chat mode of the CLI; typed input flows through the
/// same coordinator pipeline as recognized speech.
#[derive(Default)]
pub struct LineRecognizer {
    task: Option<JoinHandle<()>>,
}

impl LineRecognizer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Recognizer for LineRecognizer {
    async fn start(&mut self) -> Result<mpsc::Receiver<RecognizerEvent>, RecognizerError> {
        self.stop().await;

        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let text = line.trim().to_string();
                        if text.is_empty() {
                            continue;
                        }
                        if tx.send(RecognizerEvent::Transcript(text)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = tx.send(RecognizerEvent::Ended).await;
                        break;
                    }
                    Err(_) => {
                        let _ = tx.send(RecognizerEvent::Ended).await;
                        break;
                    }
                }
            }
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
