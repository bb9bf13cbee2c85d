use anyhow::{Context, Result};
use std::io::Cursor;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use super::backend::AudioFrame;

/// Chunk recorder configuration
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Duration of each recorded chunk (default: 4 seconds)
    pub chunk_duration: Duration,
    /// Cadence at which the recorder checks the may-record signal
    pub poll_interval: Duration,
    /// Sample rate of the encoded chunks
    pub sample_rate: u32,
    /// Number of channels of the encoded chunks
    pub channels: u16,
}

impl ChunkConfig {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            chunk_duration: Duration::from_secs(4),
            poll_interval: Duration::from_millis(1000),
            sample_rate,
            channels,
        }
    }
}

/// Recorder lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Waiting for the may-record signal at the poll cadence
    Idle,
    /// A chunk is currently being recorded
    Recording,
    /// The frame stream ended or the recorder was shut down
    Stopped,
}

enum ChunkOutcome {
    Complete(Vec<i16>),
    /// Signal flipped false mid-chunk; partial audio is discarded
    Suspended,
    StreamEnded(Vec<i16>),
}

/// Chunked audio recorder
///
/// Polls the coordinator's may-record signal at a fixed cadence and, while it
/// is true, records fixed-duration chunks from the capture stream, encoding
/// each as an in-memory WAV payload for upload. Recording is mutually
/// exclusive by construction: the single task cannot begin a new chunk while
/// one is in progress.
pub struct ChunkRecorder {
    config: ChunkConfig,
    state_tx: watch::Sender<RecorderState>,
}

impl ChunkRecorder {
    pub fn new(config: ChunkConfig) -> Self {
        let (state_tx, _) = watch::channel(RecorderState::Idle);
        Self { config, state_tx }
    }

    /// Observer for the recorder state
    pub fn state(&self) -> watch::Receiver<RecorderState> {
        self.state_tx.subscribe()
    }

    /// Drive the recorder until the capture stream or the chunk consumer
    /// goes away
    pub async fn run(
        self,
        mut frames: mpsc::Receiver<AudioFrame>,
        may_record: watch::Receiver<bool>,
        chunks: mpsc::Sender<Vec<u8>>,
    ) -> Result<usize> {
        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut produced = 0;

        info!(
            "Chunk recorder started ({}s chunks, {}ms poll)",
            self.config.chunk_duration.as_secs(),
            self.config.poll_interval.as_millis()
        );

        loop {
            poll.tick().await;

            if !*may_record.borrow() {
                continue;
            }

            self.state_tx.send_replace(RecorderState::Recording);
            let outcome = self
                .record_chunk(&mut frames, may_record.clone())
                .await;
            self.state_tx.send_replace(RecorderState::Idle);

            match outcome {
                ChunkOutcome::Complete(samples) => {
                    let wav = self.encode_wav(&samples)?;
                    debug!("Chunk recorded ({} samples, {} bytes)", samples.len(), wav.len());
                    if chunks.send(wav).await.is_err() {
                        break;
                    }
                    produced += 1;
                }
                ChunkOutcome::Suspended => {
                    debug!("Chunk discarded: capture suspended mid-recording");
                }
                ChunkOutcome::StreamEnded(samples) => {
                    if !samples.is_empty() && *may_record.borrow() {
                        let wav = self.encode_wav(&samples)?;
                        let _ = chunks.send(wav).await;
                        produced += 1;
                    }
                    break;
                }
            }
        }

        self.state_tx.send_replace(RecorderState::Stopped);
        info!("Chunk recorder stopped: {} chunks produced", produced);

        Ok(produced)
    }

    async fn record_chunk(
        &self,
        frames: &mut mpsc::Receiver<AudioFrame>,
        mut may_record: watch::Receiver<bool>,
    ) -> ChunkOutcome {
        let target_samples = (self.config.sample_rate as u64
            * self.config.channels as u64
            * self.config.chunk_duration.as_millis() as u64
            / 1000) as usize;

        let mut samples: Vec<i16> = Vec::with_capacity(target_samples);

        while samples.len() < target_samples {
            tokio::select! {
                frame = frames.recv() => {
                    match frame {
                        Some(frame) => samples.extend_from_slice(&frame.samples),
                        None => return ChunkOutcome::StreamEnded(samples),
                    }
                }
                changed = may_record.changed() => {
                    match changed {
                        Ok(()) if *may_record.borrow() => continue,
                        // Suspended (or the signal owner went away): abandon
                        // the partial chunk rather than shipping trailing
                        // assistant audio
                        _ => return ChunkOutcome::Suspended,
                    }
                }
            }
        }

        ChunkOutcome::Complete(samples)
    }

    fn encode_wav(&self, samples: &[i16]) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: self.config.channels,
            sample_rate: self.config.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut buf = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut buf), spec)
                .context("Failed to create WAV writer")?;
            for &sample in samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            writer.finalize().context("Failed to finalize WAV chunk")?;
        }

        Ok(buf)
    }
}
