use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::machine::CallState;

/// Who produced a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

/// One entry in the conversation transcript. Turns are append-only and never
/// mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Snapshot of a call session
#[derive(Debug, Clone, Serialize)]
pub struct CallStatus {
    pub session_id: String,
    pub driver_id: String,
    pub state: CallState,
    pub active: bool,
    /// True while the microphone/recognizer is actually capturing
    pub capturing: bool,
    pub muted: bool,
    pub speaker_off: bool,
    pub started_at: DateTime<Utc>,
    /// Seconds since call start; 0 once the call has ended
    pub duration_secs: f64,
    pub turns: usize,
}
