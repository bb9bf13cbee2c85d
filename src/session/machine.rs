//! Call state machine
//!
//! Transitions are pure: `(state, event, flags) -> (state, effects)`. The
//! coordinator applies the effects; nothing here touches a socket, a device,
//! or a clock. Capture is suspended before a request effect is emitted and
//! resumes only through a later `ResumeElapsed` event, which is what keeps
//! the assistant from transcribing its own replies.

use crate::audio::EncodedAudio;
use crate::dialogue::{DialogueError, DialogueReply};

/// Phrases that terminate the call when they appear in recognized or
/// received text (case-insensitive substring match)
pub const EXIT_PHRASES: [&str; 2] = ["exit", "goodbye"];

/// Transcript entry used when a dialogue request fails
pub const ERROR_TURN_TEXT: &str = "Sorry, I encountered an error. Please try again.";

pub fn is_exit_phrase(text: &str) -> bool {
    let lower = text.to_lowercase();
    EXIT_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Idle,
    Listening,
    Processing,
    Speaking,
    Ended,
}

/// Discrete events driving the machine
#[derive(Debug)]
pub enum CallEvent {
    /// The call was started
    Started,
    /// The greeting timer fired
    Greet,
    /// A recognized or typed utterance arrived
    Utterance(String),
    /// A recorded audio chunk arrived
    Chunk(Vec<u8>),
    /// The in-flight dialogue request resolved
    Reply(Result<DialogueReply, DialogueError>),
    /// Reply playback finished
    PlaybackFinished { then_end: bool },
    /// The resume timer (reply delay or echo cooldown) fired
    ResumeElapsed { then_end: bool },
    /// Explicit termination
    EndRequested,
}

/// Side effects requested by a transition, in execution order
#[derive(Debug, PartialEq)]
pub enum Effect {
    BeginCapture,
    SuspendCapture,
    ScheduleGreeting,
    AppendUser(String),
    AppendAssistant(String),
    AppendErrorTurn,
    /// Issue the opening exchange (no user turn is recorded)
    SendGreeting,
    SendText(String),
    SendChunk(Vec<u8>),
    Play { audio: EncodedAudio, then_end: bool },
    ScheduleResume { delay: ResumeDelay, then_end: bool },
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDelay {
    /// Short pause after a reply with no audio (~1s)
    AfterReply,
    /// Cooldown after playback so the microphone misses trailing audio (~3s)
    EchoCooldown,
}

/// Read-only session toggles consulted by transitions
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionFlags {
    /// Speaker off: reply audio is skipped, the no-audio resume path applies
    pub speaker_off: bool,
}

pub fn transition(
    state: CallState,
    event: CallEvent,
    flags: SessionFlags,
) -> (CallState, Vec<Effect>) {
    use CallEvent::*;
    use CallState::*;

    match (state, event) {
        (Ended, _) => (Ended, vec![]),

        (_, EndRequested) => (Ended, vec![Effect::Terminate]),

        (Idle, Started) => (
            Listening,
            vec![Effect::BeginCapture, Effect::ScheduleGreeting],
        ),

        (Listening, Greet) => (
            Processing,
            vec![Effect::SuspendCapture, Effect::SendGreeting],
        ),

        (Listening, Utterance(text)) => {
            if is_exit_phrase(&text) {
                return (Ended, vec![Effect::Terminate]);
            }
            (
                Processing,
                vec![
                    Effect::SuspendCapture,
                    Effect::AppendUser(text.clone()),
                    Effect::SendText(text),
                ],
            )
        }

        (Listening, Chunk(wav)) => (
            Processing,
            vec![Effect::SuspendCapture, Effect::SendChunk(wav)],
        ),

        // An exit phrase terminates from any state; all other input while a
        // request is in flight or a reply is playing is dropped, never queued
        (Processing | Speaking, Utterance(text)) if is_exit_phrase(&text) => {
            (Ended, vec![Effect::Terminate])
        }
        (Processing | Speaking, Utterance(_) | Chunk(_) | Greet) => (state, vec![]),

        (Processing, Reply(Ok(reply))) => {
            let mut effects = Vec::new();

            let transcript_exit = reply
                .transcript
                .as_deref()
                .is_some_and(is_exit_phrase);
            if let Some(transcript) = reply.transcript {
                effects.push(Effect::AppendUser(transcript));
            }

            let then_end =
                reply.should_end || transcript_exit || is_exit_phrase(&reply.text);

            effects.push(Effect::AppendAssistant(reply.text));

            match reply.audio {
                Some(audio) if !flags.speaker_off => {
                    effects.push(Effect::Play { audio, then_end });
                    (Speaking, effects)
                }
                _ => {
                    effects.push(Effect::ScheduleResume {
                        delay: ResumeDelay::AfterReply,
                        then_end,
                    });
                    (Processing, effects)
                }
            }
        }

        (Processing, Reply(Err(_))) => (
            Processing,
            vec![
                Effect::AppendErrorTurn,
                Effect::ScheduleResume {
                    delay: ResumeDelay::AfterReply,
                    then_end: false,
                },
            ],
        ),

        (Speaking, PlaybackFinished { then_end }) => (
            Speaking,
            vec![Effect::ScheduleResume {
                delay: ResumeDelay::EchoCooldown,
                then_end,
            }],
        ),

        (Processing | Speaking, ResumeElapsed { then_end: false }) => {
            (Listening, vec![Effect::BeginCapture])
        }

        (Processing | Speaking, ResumeElapsed { then_end: true }) => {
            (Ended, vec![Effect::Terminate])
        }

        // Anything else is a stale timer or out-of-order completion
        (state, _) => (state, vec![]),
    }
}
