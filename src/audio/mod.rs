pub mod backend;
pub mod chunk;
pub mod file;
pub mod microphone;
pub mod transport;

pub use backend::{
    AudioFrame, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureError, CaptureSource,
};
pub use chunk::{ChunkConfig, ChunkRecorder, RecorderState};
pub use file::FileBackend;
pub use microphone::MicrophoneBackend;
pub use transport::{EncodedAudio, TransportError};
