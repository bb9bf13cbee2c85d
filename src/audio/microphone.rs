use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, StreamConfig};
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::backend::{AudioFrame, CaptureBackend, CaptureConfig, CaptureError};

/// Microphone capture via the default cpal input device.
///
/// The cpal stream handle is not `Send`, so the stream lives on a dedicated
/// thread for the lifetime of the capture; `stop()` signals the thread and
/// joins it, which closes the device.
pub struct MicrophoneBackend {
    config: CaptureConfig,
    worker: Option<CaptureWorker>,
}

struct CaptureWorker {
    stop_tx: std::sync::mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl MicrophoneBackend {
    pub fn new(config: CaptureConfig) -> Result<Self, CaptureError> {
        Ok(Self {
            config,
            worker: None,
        })
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::Stream("capture already started".to_string()));
        }

        let (frame_tx, frame_rx) = mpsc::channel(64);
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), CaptureError>>();
        let config = self.config.clone();

        let handle = thread::spawn(move || {
            let stream = match build_input_stream(&config, frame_tx) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(CaptureError::Stream(e.to_string())));
                return;
            }

            let _ = ready_tx.send(Ok(()));

            // Park until stop() signals (or the backend is dropped)
            let _ = stop_rx.recv();
            drop(stream);
        });

        match ready_rx.await {
            Ok(Ok(())) => {
                info!("Microphone capture started");
                self.worker = Some(CaptureWorker { stop_tx, handle });
                Ok(frame_rx)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(CaptureError::Stream(
                "capture thread exited before reporting readiness".to_string(),
            )),
        }
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            let handle = worker.handle;
            tokio::task::spawn_blocking(move || {
                let _ = handle.join();
            })
            .await
            .map_err(|e| CaptureError::Stream(e.to_string()))?;
            info!("Microphone capture stopped");
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.worker.is_some()
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

fn build_input_stream(
    config: &CaptureConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> Result<cpal::Stream, CaptureError> {
    let device = cpal::default_host().default_input_device().ok_or_else(|| {
        CaptureError::DeviceUnavailable("no default input device".to_string())
    })?;

    info!(
        "Using input device: {}",
        device.name().unwrap_or_else(|_| "unknown".to_string())
    );

    let stream_config = StreamConfig {
        channels: config.channels,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let samples_per_frame = (config.sample_rate as u64 * config.channels as u64
        * config.buffer_duration_ms
        / 1000) as usize;
    let frame_duration_ms = config.buffer_duration_ms;
    let sample_rate = config.sample_rate;
    let channels = config.channels;

    let mut buffer: Vec<i16> = Vec::with_capacity(samples_per_frame);
    let mut frame_count: u64 = 0;

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    let clamped = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                    buffer.push(clamped);

                    if buffer.len() >= samples_per_frame {
                        let frame = AudioFrame {
                            samples: std::mem::replace(
                                &mut buffer,
                                Vec::with_capacity(samples_per_frame),
                            ),
                            sample_rate,
                            channels,
                            timestamp_ms: frame_count * frame_duration_ms,
                        };
                        frame_count += 1;

                        // Callback runs on the device thread: never block it
                        if frame_tx.try_send(frame).is_err() {
                            warn!("Audio frame dropped: receiver not keeping up");
                        }
                    }
                }
            },
            move |err| {
                warn!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| match e {
            // A denied microphone permission surfaces as an unavailable device
            BuildStreamError::DeviceNotAvailable => {
                CaptureError::PermissionDenied(e.to_string())
            }
            other => CaptureError::Stream(other.to_string()),
        })?;

    Ok(stream)
}
