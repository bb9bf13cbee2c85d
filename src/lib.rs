pub mod audio;
pub mod config;
pub mod dialogue;
pub mod http;
pub mod playback;
pub mod recognizer;
pub mod session;

pub use audio::{
    AudioFrame, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureError, CaptureSource,
    ChunkConfig, ChunkRecorder, EncodedAudio, RecorderState, TransportError,
};
pub use config::Config;
pub use dialogue::{
    ChatResponse, Dialogue, DialogueError, DialogueReply, HttpDialogue, StreamDialogue,
};
pub use http::{create_router, AppState};
pub use playback::{NullPlayer, Player, PlaybackError, RodioPlayer};
pub use recognizer::{LineRecognizer, Recognizer, RecognizerError, RecognizerEvent};
pub use session::{
    CallConfig, CallHandle, CallSession, CallState, CallStatus, ManualInput, RecognizerInput,
    RecorderInput, SessionError, Speaker, Turn,
};
