// End-to-end coordinator scenarios
//
// These drive a CallSession against scripted dialogue/playback/input
// implementations on a paused tokio clock, so the reply delay and echo
// cooldown can be asserted exactly.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use swap_voice::dialogue::{Dialogue, DialogueError, DialogueReply};
use swap_voice::playback::{Player, PlaybackError};
use swap_voice::session::machine::ERROR_TURN_TEXT;
use swap_voice::session::{
    CallConfig, CallHandle, CallSession, CallState, InputEvent, InputStrategy, ManualInput,
    SessionError, Speaker,
};
use swap_voice::EncodedAudio;
use tokio::sync::{mpsc, oneshot};

const FAR_FUTURE: Duration = Duration::from_secs(3600);

/// Timings used by most tests; the greeting is pushed out of the way so
/// scenarios control every request themselves
fn test_config() -> CallConfig {
    CallConfig {
        driver_id: "driver-42".to_string(),
        session_id: "call-under-test".to_string(),
        greeting_delay: FAR_FUTURE,
        reply_delay: Duration::from_millis(1000),
        echo_cooldown: Duration::from_millis(3000),
    }
}

fn reply(text: &str, audio: Option<EncodedAudio>, should_end: bool) -> DialogueReply {
    DialogueReply {
        transcript: None,
        text: text.to_string(),
        audio,
        should_end,
    }
}

/// Let the event loop and any spawned request tasks run without moving the
/// paused clock
async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

async fn advance(millis: u64) {
    tokio::time::advance(Duration::from_millis(millis)).await;
    settle().await;
}

// ============================================================================
// Scripted collaborators
// ============================================================================

#[derive(Default)]
struct ScriptedDialogue {
    replies: Mutex<VecDeque<Result<DialogueReply, DialogueError>>>,
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl ScriptedDialogue {
    fn queue(&self, outcome: Result<DialogueReply, DialogueError>) {
        self.replies.lock().unwrap().push_back(outcome);
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Result<DialogueReply, DialogueError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DialogueError::Transport("no scripted reply".to_string())))
    }
}

#[async_trait::async_trait]
impl Dialogue for ScriptedDialogue {
    async fn send_text(&self, query: &str) -> Result<DialogueReply, DialogueError> {
        self.sent.lock().unwrap().push(query.to_string());
        self.next_reply()
    }

    async fn send_audio(&self, _wav: Vec<u8>) -> Result<DialogueReply, DialogueError> {
        self.sent.lock().unwrap().push("<chunk>".to_string());
        self.next_reply()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ScriptedPlayer {
    completions: Mutex<Vec<oneshot::Sender<()>>>,
    played: AtomicUsize,
    stopped: AtomicBool,
}

impl ScriptedPlayer {
    /// Finish the playback in progress
    fn finish(&self) {
        if let Some(tx) = self.completions.lock().unwrap().pop() {
            let _ = tx.send(());
        }
    }
}

impl Player for ScriptedPlayer {
    fn play(&self, _bytes: Vec<u8>) -> Result<oneshot::Receiver<()>, PlaybackError> {
        let (tx, rx) = oneshot::channel();
        self.completions.lock().unwrap().push(tx);
        self.played.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Input strategy with observable capture state and an injection channel
/// standing in for a recognizer
struct ScriptedInput {
    slot: Arc<Mutex<Option<mpsc::Sender<InputEvent>>>>,
    capturing: Arc<AtomicBool>,
    shut_down: Arc<AtomicBool>,
}

#[derive(Clone, Default)]
struct InputProbe {
    slot: Arc<Mutex<Option<mpsc::Sender<InputEvent>>>>,
    capturing: Arc<AtomicBool>,
    shut_down: Arc<AtomicBool>,
}

impl InputProbe {
    fn strategy(&self) -> Box<dyn InputStrategy> {
        Box::new(ScriptedInput {
            slot: Arc::clone(&self.slot),
            capturing: Arc::clone(&self.capturing),
            shut_down: Arc::clone(&self.shut_down),
        })
    }

    async fn hear(&self, text: &str) {
        let tx = self.slot.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(InputEvent::Utterance(text.to_string())).await;
        }
    }

    fn capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl InputStrategy for ScriptedInput {
    async fn start(&mut self) -> Result<mpsc::Receiver<InputEvent>, SessionError> {
        let (tx, rx) = mpsc::channel(8);
        *self.slot.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn resume(&mut self) -> Result<(), SessionError> {
        self.capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn suspend(&mut self) {
        self.capturing.store(false, Ordering::SeqCst);
    }

    async fn shutdown(&mut self) {
        self.capturing.store(false, Ordering::SeqCst);
        self.shut_down.store(true, Ordering::SeqCst);
        *self.slot.lock().unwrap() = None;
    }
}

struct Harness {
    dialogue: Arc<ScriptedDialogue>,
    player: Arc<ScriptedPlayer>,
    probe: InputProbe,
    handle: CallHandle,
}

async fn start_call(config: CallConfig) -> Harness {
    let dialogue = Arc::new(ScriptedDialogue::default());
    let player = Arc::new(ScriptedPlayer::default());
    let probe = InputProbe::default();

    let handle = CallSession::start(
        config,
        Arc::clone(&dialogue) as Arc<dyn Dialogue>,
        Arc::clone(&player) as Arc<dyn Player>,
        probe.strategy(),
    )
    .await
    .expect("session should start");

    settle().await;

    Harness {
        dialogue,
        player,
        probe,
        handle,
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn greeting_reply_lands_as_opening_assistant_turn() {
    let config = CallConfig {
        greeting_delay: Duration::from_millis(1000),
        ..test_config()
    };

    let h = start_call(config).await;
    h.dialogue.queue(Ok(reply("Namaste", None, false)));

    assert_eq!(h.handle.status().state, CallState::Listening);
    assert!(h.probe.capturing());

    // Greeting timer fires: silent "hello" query, no user turn
    advance(1000).await;
    assert_eq!(h.dialogue.sent(), vec!["hello".to_string()]);

    let turns = h.handle.transcript();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].speaker, Speaker::Assistant);
    assert_eq!(turns[0].text, "Namaste");
    assert_eq!(h.handle.status().state, CallState::Processing);

    // Reply carried no audio: listening resumes after the fixed delay
    advance(1000).await;
    assert_eq!(h.handle.status().state, CallState::Listening);
    assert!(h.probe.capturing());
}

#[tokio::test(start_paused = true)]
async fn voice_turn_with_audio_plays_then_cools_down() {
    let h = start_call(test_config()).await;
    h.dialogue.queue(Ok(reply(
        "Battery station bata raha hoon",
        Some(EncodedAudio::from_bytes_hex(&[0x01, 0x02, 0x03])),
        false,
    )));

    h.probe.hear("Mujhe battery chahiye").await;
    settle().await;

    // Request sent once, reply is speaking, capture suspended
    assert_eq!(h.dialogue.sent().len(), 1);
    assert_eq!(h.handle.status().state, CallState::Speaking);
    assert_eq!(h.player.played.load(Ordering::SeqCst), 1);
    assert!(!h.probe.capturing());

    let turns = h.handle.transcript();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].speaker, Speaker::User);
    assert_eq!(turns[1].speaker, Speaker::Assistant);

    // Playback ends; the microphone stays closed through the echo cooldown
    h.player.finish();
    settle().await;
    assert_eq!(h.handle.status().state, CallState::Speaking);
    assert!(!h.probe.capturing());

    advance(2999).await;
    assert_eq!(h.handle.status().state, CallState::Speaking);

    advance(1).await;
    assert_eq!(h.handle.status().state, CallState::Listening);
    assert!(h.probe.capturing());
    assert_eq!(h.handle.transcript().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn second_utterance_while_processing_is_dropped() {
    let h = start_call(test_config()).await;
    h.dialogue.queue(Ok(reply("Ek minute", None, false)));

    assert!(h.handle.say("Mujhe battery chahiye").await);
    let accepted = h.handle.say("aur haan, swap price?").await;
    assert!(!accepted, "input while processing must be dropped");

    settle().await;
    assert_eq!(h.dialogue.sent().len(), 1, "exactly one request sent");

    // Only the first utterance and its reply are in the transcript
    advance(1000).await;
    let turns = h.handle.transcript();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].text, "Mujhe battery chahiye");
}

#[tokio::test(start_paused = true)]
async fn no_audio_reply_resumes_after_exact_delay() {
    let h = start_call(test_config()).await;
    h.dialogue.queue(Ok(reply("Namaste", None, false)));

    h.handle.say("hello there").await;
    settle().await;
    assert_eq!(h.handle.status().state, CallState::Processing);
    assert!(!h.probe.capturing());

    // 1ms early: still suspended
    advance(999).await;
    assert_eq!(h.handle.status().state, CallState::Processing);
    assert!(!h.probe.capturing());

    advance(1).await;
    assert_eq!(h.handle.status().state, CallState::Listening);
    assert!(h.probe.capturing());
}

#[tokio::test(start_paused = true)]
async fn failed_request_inserts_error_turn_and_recovers() {
    let h = start_call(test_config()).await;
    h.dialogue
        .queue(Err(DialogueError::Transport("connection refused".to_string())));

    h.handle.say("swap price kya hai").await;
    settle().await;

    let turns = h.handle.transcript();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].speaker, Speaker::Assistant);
    assert_eq!(turns[1].text, ERROR_TURN_TEXT);

    // Never stuck in Processing
    advance(1000).await;
    assert_eq!(h.handle.status().state, CallState::Listening);
    assert!(h.handle.is_active());
}

#[tokio::test(start_paused = true)]
async fn exit_phrase_ends_the_call() {
    let h = start_call(test_config()).await;

    h.probe.hear("thik hai, goodbye").await;
    settle().await;

    assert!(!h.handle.is_active());
    assert_eq!(h.handle.status().state, CallState::Ended);
    assert!(h.probe.shut_down());
    assert!(h.dialogue.sent().is_empty(), "no request for an exit phrase");
}

#[tokio::test(start_paused = true)]
async fn should_end_reply_finishes_then_terminates() {
    let h = start_call(test_config()).await;
    h.dialogue
        .queue(Ok(reply("Dhanyawad! Aapka din shubh ho.", None, true)));

    h.handle.say("bas ho gaya, thanks").await;
    settle().await;
    assert!(h.handle.is_active());

    advance(1000).await;
    assert!(!h.handle.is_active());
    assert_eq!(h.handle.status().state, CallState::Ended);
    assert!(h.probe.shut_down());
}

#[tokio::test(start_paused = true)]
async fn ending_releases_everything_and_late_timers_are_noops() {
    let config = CallConfig {
        greeting_delay: Duration::from_millis(1000),
        ..test_config()
    };
    let h = start_call(config).await;

    h.handle.end().await;
    settle().await;

    assert!(!h.handle.is_active());
    assert_eq!(h.handle.status().state, CallState::Ended);
    assert!(h.probe.shut_down());
    assert!(!h.probe.capturing());
    assert!(h.player.stopped.load(Ordering::SeqCst));
    assert!(h.dialogue.closed.load(Ordering::SeqCst));
    assert!(h.handle.transcript().is_empty());
    assert_eq!(h.handle.status().duration_secs, 0.0);

    // The greeting timer was due at t+1000; nothing may happen now
    advance(5000).await;
    assert_eq!(h.handle.status().state, CallState::Ended);
    assert!(h.handle.transcript().is_empty());
    assert!(h.dialogue.sent().is_empty());

    // Saying anything into an ended call is rejected
    assert!(!h.handle.say("hello?").await);
}

#[tokio::test(start_paused = true)]
async fn mute_suppresses_capture_without_leaving_listening() {
    let h = start_call(test_config()).await;
    assert!(h.probe.capturing());

    h.handle.set_muted(true).await;
    settle().await;
    assert_eq!(h.handle.status().state, CallState::Listening);
    assert!(!h.probe.capturing());
    assert!(h.handle.status().muted);

    h.handle.set_muted(false).await;
    settle().await;
    assert!(h.probe.capturing());
}

#[tokio::test(start_paused = true)]
async fn speaker_off_skips_reply_audio() {
    let h = start_call(test_config()).await;
    h.handle.set_speaker_off(true).await;
    settle().await;

    h.dialogue.queue(Ok(reply(
        "Station Sector 62 mein hai",
        Some(EncodedAudio::from_bytes_hex(&[0xAB, 0xCD])),
        false,
    )));

    h.handle.say("station kahan hai").await;
    settle().await;

    // No playback; the short resume path applies instead of the cooldown
    assert_eq!(h.player.played.load(Ordering::SeqCst), 0);
    assert_eq!(h.handle.status().state, CallState::Processing);
    advance(1000).await;
    assert_eq!(h.handle.status().state, CallState::Listening);
}

#[tokio::test(start_paused = true)]
async fn server_transcript_is_recorded_as_user_turn() {
    let h = start_call(test_config()).await;
    h.dialogue.queue(Ok(DialogueReply {
        transcript: Some("penalty kitna hai".to_string()),
        text: "Penalty 120 rupaye hai".to_string(),
        audio: None,
        should_end: false,
    }));

    // A recorded chunk arrives from the capture side
    {
        let tx = h.probe.slot.lock().unwrap().clone().unwrap();
        tx.send(InputEvent::Chunk(vec![0u8; 16])).await.unwrap();
    }
    settle().await;

    assert_eq!(h.dialogue.sent(), vec!["<chunk>".to_string()]);
    let turns = h.handle.transcript();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].speaker, Speaker::User);
    assert_eq!(turns[0].text, "penalty kitna hai");
    assert_eq!(turns[1].speaker, Speaker::Assistant);
}

#[tokio::test(start_paused = true)]
async fn manual_input_calls_accept_say_only_while_listening() {
    let dialogue = Arc::new(ScriptedDialogue::default());
    let player = Arc::new(ScriptedPlayer::default());

    let handle = CallSession::start(
        test_config(),
        Arc::clone(&dialogue) as Arc<dyn Dialogue>,
        player as Arc<dyn Player>,
        Box::new(ManualInput::new()),
    )
    .await
    .expect("session should start");
    settle().await;

    dialogue.queue(Ok(reply("Namaste", None, false)));

    assert!(handle.say("hello").await);
    assert!(!handle.say("too soon").await);

    advance(1000).await;
    assert!(handle.say("now it listens again").await);
}
