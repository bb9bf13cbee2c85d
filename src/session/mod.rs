//! Call session management
//!
//! This module provides the call-session coordinator:
//! - A pure state machine deciding when to capture, send, play, and end
//! - Input strategies (chunk recorder, local recognizer, manual injection)
//! - The event loop that owns session state and applies effects
//! - Session status and transcript types

pub mod config;
pub mod input;
pub mod machine;
pub mod session;
pub mod stats;

pub use config::CallConfig;
pub use input::{InputEvent, InputStrategy, ManualInput, RecognizerInput, RecorderInput};
pub use machine::{CallEvent, CallState, Effect, ResumeDelay, SessionFlags};
pub use session::{CallHandle, CallSession};
pub use stats::{CallStatus, Speaker, Turn};

use thiserror::Error;

/// Errors that prevent a call session from starting or running
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] crate::audio::CaptureError),

    #[error(transparent)]
    Recognizer(#[from] crate::recognizer::RecognizerError),

    #[error(transparent)]
    Playback(#[from] crate::playback::PlaybackError),
}
