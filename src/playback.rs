//! Reply audio playback
//!
//! rodio output handles are not `Send`, so `RodioPlayer` parks the output
//! stream on its own thread and takes commands over a channel. Starting a new
//! playback replaces the current one; every accepted playback fires its
//! completion exactly once, including when it is replaced or stopped early.

use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio output unavailable: {0}")]
    Output(String),

    #[error("could not decode reply audio: {0}")]
    Decode(String),

    #[error("playback worker is gone")]
    Closed,
}

/// Playback controller: decoded reply bytes in, completion notification out
pub trait Player: Send + Sync {
    /// Start playing, replacing any playback in progress. The returned
    /// receiver resolves exactly once, when this playback finishes or is
    /// replaced/stopped.
    fn play(&self, bytes: Vec<u8>) -> Result<oneshot::Receiver<()>, PlaybackError>;

    /// Stop the current playback, if any
    fn stop(&self);
}

enum Command {
    Play {
        source: Decoder<Cursor<Vec<u8>>>,
        done: oneshot::Sender<()>,
    },
    Stop,
}

/// Plays reply audio on the default output device
pub struct RodioPlayer {
    tx: Sender<Command>,
}

impl RodioPlayer {
    pub fn new() -> Result<Self, PlaybackError> {
        let (tx, rx) = std::sync::mpsc::channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        thread::spawn(move || worker(rx, ready_tx));

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { tx }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(PlaybackError::Closed),
        }
    }
}

impl Player for RodioPlayer {
    fn play(&self, bytes: Vec<u8>) -> Result<oneshot::Receiver<()>, PlaybackError> {
        // Validate the payload here so a bad reply never yields a completion
        let source = Decoder::new(Cursor::new(bytes))
            .map_err(|e| PlaybackError::Decode(e.to_string()))?;

        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Command::Play {
                source,
                done: done_tx,
            })
            .map_err(|_| PlaybackError::Closed)?;

        Ok(done_rx)
    }

    fn stop(&self) {
        let _ = self.tx.send(Command::Stop);
    }
}

fn worker(rx: Receiver<Command>, ready_tx: Sender<Result<(), PlaybackError>>) {
    let (_stream, stream_handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ready_tx.send(Err(PlaybackError::Output(e.to_string())));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    info!("Playback worker ready");

    let mut current: Option<(Sink, oneshot::Sender<()>)> = None;

    loop {
        // While something is playing, poll for both completion and commands
        let command = if current.is_some() {
            match rx.recv_timeout(Duration::from_millis(50)) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => {
                    let finished = current
                        .as_ref()
                        .map(|(sink, _)| sink.empty())
                        .unwrap_or(false);
                    if finished {
                        if let Some((_, done)) = current.take() {
                            let _ = done.send(());
                        }
                    }
                    None
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match rx.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        match command {
            Some(Command::Play { source, done }) => {
                if let Some((sink, old_done)) = current.take() {
                    sink.stop();
                    let _ = old_done.send(());
                }
                match Sink::try_new(&stream_handle) {
                    Ok(sink) => {
                        sink.append(source);
                        current = Some((sink, done));
                    }
                    Err(e) => {
                        warn!("Playback sink error: {}", e);
                        let _ = done.send(());
                    }
                }
            }
            Some(Command::Stop) => {
                if let Some((sink, done)) = current.take() {
                    sink.stop();
                    let _ = done.send(());
                }
            }
            None => {}
        }
    }

    if let Some((sink, done)) = current.take() {
        sink.stop();
        let _ = done.send(());
    }
}

/// Player that renders nothing and completes immediately.
///
/// Server-hosted calls have no output device; the coordinator still observes
/// the Speaking state and cooldown path.
#[derive(Debug, Default)]
pub struct NullPlayer;

impl Player for NullPlayer {
    fn play(&self, _bytes: Vec<u8>) -> Result<oneshot::Receiver<()>, PlaybackError> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(());
        Ok(rx)
    }

    fn stop(&self) {}
}
