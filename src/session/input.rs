//! Input strategies
//!
//! The two call variants (local speech recognition vs chunked audio upload)
//! are modeled as interchangeable strategies behind one interface.
//! `ManualInput` adds a third for control-surface-driven calls, where
//! utterances arrive as typed text only.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use super::SessionError;
use crate::audio::{CaptureBackend, ChunkConfig, ChunkRecorder};
use crate::recognizer::{Recognizer, RecognizerEvent};

/// One unit of user input, whichever capture path produced it
#[derive(Debug)]
pub enum InputEvent {
    /// Recognized or typed text
    Utterance(String),
    /// Recorded WAV chunk for server-side transcription
    Chunk(Vec<u8>),
}

/// Capture side of a call.
///
/// `start` acquires devices and is the one fallible setup point: a denied
/// microphone or a missing recognizer aborts session start. `resume` and
/// `suspend` flip capture around the Listening state; `shutdown` releases
/// everything.
#[async_trait::async_trait]
pub trait InputStrategy: Send {
    async fn start(&mut self) -> Result<mpsc::Receiver<InputEvent>, SessionError>;

    async fn resume(&mut self) -> Result<(), SessionError>;

    async fn suspend(&mut self);

    async fn shutdown(&mut self);
}

/// Chunk-recorder strategy: capture backend frames are cut into fixed-length
/// WAV chunks while the may-record signal is up
pub struct RecorderInput {
    backend: Box<dyn CaptureBackend>,
    chunk_config: ChunkConfig,
    may_record: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RecorderInput {
    pub fn new(backend: Box<dyn CaptureBackend>, chunk_config: ChunkConfig) -> Self {
        let (may_record, _) = watch::channel(false);
        Self {
            backend,
            chunk_config,
            may_record,
            tasks: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl InputStrategy for RecorderInput {
    async fn start(&mut self) -> Result<mpsc::Receiver<InputEvent>, SessionError> {
        let frames = self.backend.start().await?;

        let (event_tx, event_rx) = mpsc::channel(8);
        let (chunk_tx, mut chunk_rx) = mpsc::channel::<Vec<u8>>(4);

        let recorder = ChunkRecorder::new(self.chunk_config.clone());
        let signal = self.may_record.subscribe();

        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = recorder.run(frames, signal, chunk_tx).await {
                error!("Chunk recorder failed: {}", e);
            }
        }));

        self.tasks.push(tokio::spawn(async move {
            while let Some(wav) = chunk_rx.recv().await {
                if event_tx.send(InputEvent::Chunk(wav)).await.is_err() {
                    break;
                }
            }
        }));

        Ok(event_rx)
    }

    async fn resume(&mut self) -> Result<(), SessionError> {
        self.may_record.send_replace(true);
        Ok(())
    }

    async fn suspend(&mut self) {
        self.may_record.send_replace(false);
    }

    async fn shutdown(&mut self) {
        self.may_record.send_replace(false);
        if let Err(e) = self.backend.stop().await {
            warn!("Capture backend stop failed: {}", e);
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Local-recognizer strategy: transcripts become utterances directly;
/// suspension stops the recognizer so it cannot hear the assistant
pub struct RecognizerInput {
    recognizer: Box<dyn Recognizer>,
    event_tx: Option<mpsc::Sender<InputEvent>>,
    forward_task: Option<JoinHandle<()>>,
    running: bool,
}

impl RecognizerInput {
    pub fn new(recognizer: Box<dyn Recognizer>) -> Self {
        Self {
            recognizer,
            event_tx: None,
            forward_task: None,
            running: false,
        }
    }

    fn spawn_forwarder(&mut self, mut transcripts: mpsc::Receiver<RecognizerEvent>) {
        let Some(tx) = self.event_tx.clone() else {
            return;
        };
        self.forward_task = Some(tokio::spawn(async move {
            while let Some(event) = transcripts.recv().await {
                match event {
                    RecognizerEvent::Transcript(text) => {
                        if tx.send(InputEvent::Utterance(text)).await.is_err() {
                            break;
                        }
                    }
                    RecognizerEvent::Ended => break,
                }
            }
        }));
    }
}

#[async_trait::async_trait]
impl InputStrategy for RecognizerInput {
    async fn start(&mut self) -> Result<mpsc::Receiver<InputEvent>, SessionError> {
        let (event_tx, event_rx) = mpsc::channel(8);
        self.event_tx = Some(event_tx);

        // Acquire the recognizer up front: an unsupported environment must
        // fail the call before it becomes active
        let transcripts = self.recognizer.start().await?;
        self.spawn_forwarder(transcripts);
        self.running = true;

        Ok(event_rx)
    }

    async fn resume(&mut self) -> Result<(), SessionError> {
        if self.running {
            return Ok(());
        }
        let transcripts = self.recognizer.start().await?;
        self.spawn_forwarder(transcripts);
        self.running = true;
        Ok(())
    }

    async fn suspend(&mut self) {
        self.recognizer.stop().await;
        if let Some(task) = self.forward_task.take() {
            task.abort();
        }
        self.running = false;
    }

    async fn shutdown(&mut self) {
        self.suspend().await;
        self.event_tx = None;
    }
}

/// No capture at all: utterances are injected through the call handle
/// (HTTP control surface, tests)
#[derive(Default)]
pub struct ManualInput {
    // Keeps the event channel open for the session's lifetime
    event_tx: Option<mpsc::Sender<InputEvent>>,
}

impl ManualInput {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl InputStrategy for ManualInput {
    async fn start(&mut self) -> Result<mpsc::Receiver<InputEvent>, SessionError> {
        let (tx, rx) = mpsc::channel(1);
        self.event_tx = Some(tx);
        Ok(rx)
    }

    async fn resume(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn suspend(&mut self) {}

    async fn shutdown(&mut self) {
        self.event_tx = None;
    }
}
