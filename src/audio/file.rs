use hound::WavReader;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::backend::{AudioFrame, CaptureBackend, CaptureConfig, CaptureError};

/// Capture backend that replays a WAV file as a paced frame stream.
///
/// Used by tests and batch processing where no microphone is present. Frames
/// are emitted at the configured buffer cadence so downstream timing behaves
/// like a live capture.
pub struct FileBackend {
    config: CaptureConfig,
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn open(path: impl AsRef<Path>, config: CaptureConfig) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let reader = WavReader::open(path)
            .map_err(|e| CaptureError::File(format!("{}: {}", path.display(), e)))?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CaptureError::File(e.to_string()))?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {} ({:.1}s, {}Hz, {} channels)",
            path.display(),
            duration_seconds,
            spec.sample_rate,
            spec.channels
        );

        Ok(Self {
            config,
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            task: None,
        })
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        if self.task.is_some() {
            return Err(CaptureError::Stream("capture already started".to_string()));
        }

        let (tx, rx) = mpsc::channel(64);
        let samples = self.samples.clone();
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let frame_ms = self.config.buffer_duration_ms;
        let samples_per_frame =
            (sample_rate as u64 * channels as u64 * frame_ms / 1000).max(1) as usize;

        let task = tokio::spawn(async move {
            let mut timestamp_ms = 0;
            for chunk in samples.chunks(samples_per_frame) {
                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate,
                    channels,
                    timestamp_ms,
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
                timestamp_ms += frame_ms;
                tokio::time::sleep(Duration::from_millis(frame_ms)).await;
            }
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        "file"
    }
}
