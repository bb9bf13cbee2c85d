use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::CallConfig;
use super::input::{InputEvent, InputStrategy};
use super::machine::{
    self, CallEvent, CallState, Effect, ResumeDelay, SessionFlags, ERROR_TURN_TEXT,
};
use super::stats::{CallStatus, Speaker, Turn};
use super::SessionError;
use crate::dialogue::Dialogue;
use crate::playback::Player;

/// Commands accepted by the running call loop
enum Command {
    Say(String, oneshot::Sender<bool>),
    End(oneshot::Sender<()>),
    SetMuted(bool),
    SetSpeakerOff(bool),
}

/// Snapshot state shared between the call loop and its observers
struct Shared {
    session_id: String,
    driver_id: String,
    started_at: chrono::DateTime<chrono::Utc>,
    state: Mutex<CallState>,
    transcript: Mutex<Vec<Turn>>,
    active: AtomicBool,
    capturing: AtomicBool,
    muted: AtomicBool,
    speaker_off: AtomicBool,
}

/// A call session.
///
/// `start` acquires the input strategy (a denied microphone or missing
/// recognizer fails here, before the call becomes active) and spawns the
/// event loop that owns all session state. Everything else happens through
/// the returned [`CallHandle`].
pub struct CallSession;

impl CallSession {
    pub async fn start(
        config: CallConfig,
        dialogue: Arc<dyn Dialogue>,
        player: Arc<dyn Player>,
        mut input: Box<dyn InputStrategy>,
    ) -> Result<CallHandle, SessionError> {
        let input_rx = input.start().await?;

        let shared = Arc::new(Shared {
            session_id: config.session_id.clone(),
            driver_id: config.driver_id.clone(),
            started_at: Utc::now(),
            state: Mutex::new(CallState::Idle),
            transcript: Mutex::new(Vec::new()),
            active: AtomicBool::new(true),
            capturing: AtomicBool::new(false),
            muted: AtomicBool::new(false),
            speaker_off: AtomicBool::new(false),
        });

        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (loop_tx, loop_rx) = mpsc::unbounded_channel();

        info!("Call session started: {}", config.session_id);

        let driver = Driver {
            state: CallState::Idle,
            config,
            dialogue,
            player,
            input,
            shared: Arc::clone(&shared),
            loop_tx,
            pending: Vec::new(),
        };

        let task = tokio::spawn(driver.run(cmd_rx, input_rx, loop_rx));

        Ok(CallHandle {
            cmd_tx,
            shared,
            task: Arc::new(tokio::sync::Mutex::new(Some(task))),
        })
    }
}

/// Handle for controlling and observing a running call
#[derive(Clone)]
pub struct CallHandle {
    cmd_tx: mpsc::Sender<Command>,
    shared: Arc<Shared>,
    task: Arc<tokio::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl CallHandle {
    /// Inject a typed utterance. Returns false when the call was not
    /// listening (the input was dropped) or has already ended.
    pub async fn say(&self, text: impl Into<String>) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Say(text.into(), ack_tx))
            .await
            .is_err()
        {
            return false;
        }
        ack_rx.await.unwrap_or(false)
    }

    /// End the call and wait for cleanup to finish
    pub async fn end(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.cmd_tx.send(Command::End(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    pub async fn set_muted(&self, muted: bool) {
        let _ = self.cmd_tx.send(Command::SetMuted(muted)).await;
    }

    pub async fn set_speaker_off(&self, speaker_off: bool) {
        let _ = self.cmd_tx.send(Command::SetSpeakerOff(speaker_off)).await;
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> CallStatus {
        let active = self.shared.active.load(Ordering::SeqCst);
        let duration_secs = if active {
            Utc::now()
                .signed_duration_since(self.shared.started_at)
                .num_milliseconds() as f64
                / 1000.0
        } else {
            0.0
        };

        CallStatus {
            session_id: self.shared.session_id.clone(),
            driver_id: self.shared.driver_id.clone(),
            state: *self.shared.state.lock().unwrap(),
            active,
            capturing: self.shared.capturing.load(Ordering::SeqCst),
            muted: self.shared.muted.load(Ordering::SeqCst),
            speaker_off: self.shared.speaker_off.load(Ordering::SeqCst),
            started_at: self.shared.started_at,
            duration_secs,
            turns: self.shared.transcript.lock().unwrap().len(),
        }
    }

    pub fn transcript(&self) -> Vec<Turn> {
        self.shared.transcript.lock().unwrap().clone()
    }

    /// Wait until the call loop has fully terminated
    pub async fn wait(&self) {
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

/// Owns all mutable call state and applies machine transitions
struct Driver {
    state: CallState,
    config: CallConfig,
    dialogue: Arc<dyn Dialogue>,
    player: Arc<dyn Player>,
    input: Box<dyn InputStrategy>,
    shared: Arc<Shared>,
    loop_tx: mpsc::UnboundedSender<CallEvent>,
    /// Timers, in-flight requests, and playback waiters; aborted on end
    pending: Vec<JoinHandle<()>>,
}

impl Driver {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut input_rx: mpsc::Receiver<InputEvent>,
        mut loop_rx: mpsc::UnboundedReceiver<CallEvent>,
    ) {
        self.apply(CallEvent::Started).await;

        while self.state != CallState::Ended {
            tokio::select! {
                Some(command) = cmd_rx.recv() => {
                    self.handle_command(command).await;
                }
                Some(event) = input_rx.recv() => {
                    let event = match event {
                        InputEvent::Utterance(text) => CallEvent::Utterance(text),
                        InputEvent::Chunk(wav) => CallEvent::Chunk(wav),
                    };
                    self.apply(event).await;
                }
                Some(event) = loop_rx.recv() => {
                    self.apply(event).await;
                }
                else => break,
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Say(text, ack) => {
                let accepted = self.state == CallState::Listening;
                self.apply(CallEvent::Utterance(text)).await;
                let _ = ack.send(accepted);
            }
            Command::End(ack) => {
                self.apply(CallEvent::EndRequested).await;
                let _ = ack.send(());
            }
            Command::SetMuted(muted) => {
                self.shared.muted.store(muted, Ordering::SeqCst);
                if muted {
                    self.input.suspend().await;
                    self.shared.capturing.store(false, Ordering::SeqCst);
                } else if self.state == CallState::Listening {
                    if let Err(e) = self.input.resume().await {
                        warn!("Could not resume capture after unmute: {}", e);
                    } else {
                        self.shared.capturing.store(true, Ordering::SeqCst);
                    }
                }
            }
            Command::SetSpeakerOff(speaker_off) => {
                self.shared.speaker_off.store(speaker_off, Ordering::SeqCst);
            }
        }
    }

    async fn apply(&mut self, event: CallEvent) {
        let flags = SessionFlags {
            speaker_off: self.shared.speaker_off.load(Ordering::SeqCst),
        };

        let (next, effects) = machine::transition(self.state, event, flags);
        if next != self.state {
            debug!("Call {}: {:?} -> {:?}", self.config.session_id, self.state, next);
        }
        self.state = next;
        *self.shared.state.lock().unwrap() = next;

        for effect in effects {
            self.perform(effect).await;
        }

        self.pending.retain(|task| !task.is_finished());
    }

    async fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::BeginCapture => {
                if self.shared.muted.load(Ordering::SeqCst) {
                    return;
                }
                if let Err(e) = self.input.resume().await {
                    warn!("Could not resume capture: {}", e);
                } else {
                    self.shared.capturing.store(true, Ordering::SeqCst);
                }
            }
            Effect::SuspendCapture => {
                self.input.suspend().await;
                self.shared.capturing.store(false, Ordering::SeqCst);
            }
            Effect::ScheduleGreeting => {
                self.spawn_timer(self.config.greeting_delay, CallEvent::Greet);
            }
            Effect::AppendUser(text) => {
                self.append_turn(Turn::new(Speaker::User, text));
            }
            Effect::AppendAssistant(text) => {
                self.append_turn(Turn::new(Speaker::Assistant, text));
            }
            Effect::AppendErrorTurn => {
                self.append_turn(Turn::new(Speaker::Assistant, ERROR_TURN_TEXT));
            }
            Effect::SendGreeting => {
                let dialogue = Arc::clone(&self.dialogue);
                let tx = self.loop_tx.clone();
                self.pending.push(tokio::spawn(async move {
                    let result = dialogue.greet().await;
                    let _ = tx.send(CallEvent::Reply(result));
                }));
            }
            Effect::SendText(text) => {
                let dialogue = Arc::clone(&self.dialogue);
                let tx = self.loop_tx.clone();
                self.pending.push(tokio::spawn(async move {
                    let result = dialogue.send_text(&text).await;
                    let _ = tx.send(CallEvent::Reply(result));
                }));
            }
            Effect::SendChunk(wav) => {
                let dialogue = Arc::clone(&self.dialogue);
                let tx = self.loop_tx.clone();
                self.pending.push(tokio::spawn(async move {
                    let result = dialogue.send_audio(wav).await;
                    let _ = tx.send(CallEvent::Reply(result));
                }));
            }
            Effect::Play { audio, then_end } => {
                let completion = audio
                    .decode()
                    .map_err(|e| e.to_string())
                    .and_then(|bytes| {
                        self.player.play(bytes).map_err(|e| e.to_string())
                    });

                match completion {
                    Ok(done) => {
                        let tx = self.loop_tx.clone();
                        self.pending.push(tokio::spawn(async move {
                            let _ = done.await;
                            let _ = tx.send(CallEvent::PlaybackFinished { then_end });
                        }));
                    }
                    Err(e) => {
                        // Unplayable audio must not strand the session in
                        // Speaking; fall through to the cooldown path
                        warn!("Reply audio not played: {}", e);
                        let _ = self
                            .loop_tx
                            .send(CallEvent::PlaybackFinished { then_end });
                    }
                }
            }
            Effect::ScheduleResume { delay, then_end } => {
                let duration = match delay {
                    ResumeDelay::AfterReply => self.config.reply_delay,
                    ResumeDelay::EchoCooldown => self.config.echo_cooldown,
                };
                self.spawn_timer(duration, CallEvent::ResumeElapsed { then_end });
            }
            Effect::Terminate => {
                self.terminate().await;
            }
        }
    }

    fn append_turn(&self, turn: Turn) {
        self.shared.transcript.lock().unwrap().push(turn);
    }

    fn spawn_timer(&mut self, duration: Duration, event: CallEvent) {
        let tx = self.loop_tx.clone();
        self.pending.push(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(event);
        }));
    }

    async fn terminate(&mut self) {
        info!("Call session ended: {}", self.config.session_id);

        self.shared.active.store(false, Ordering::SeqCst);
        self.shared.capturing.store(false, Ordering::SeqCst);

        for task in self.pending.drain(..) {
            task.abort();
        }

        self.input.shutdown().await;
        self.player.stop();
        self.dialogue.close().await;

        self.shared.transcript.lock().unwrap().clear();
    }
}
