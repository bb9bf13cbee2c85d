// Integration tests for the chunk recorder
//
// These verify that capture frames are cut into fixed-duration WAV chunks
// only while the coordinator's may-record signal is up, and that a partial
// chunk is discarded when capture is suspended mid-recording.

use std::io::Cursor;
use std::time::Duration;
use swap_voice::audio::{AudioFrame, ChunkConfig, ChunkRecorder, RecorderState};
use tokio::sync::{mpsc, watch};

fn config() -> ChunkConfig {
    ChunkConfig {
        chunk_duration: Duration::from_secs(1), // 16000 samples at 16kHz mono
        poll_interval: Duration::from_millis(100),
        sample_rate: 16000,
        channels: 1,
    }
}

fn frame(index: u64, samples: usize, value: i16) -> AudioFrame {
    AudioFrame {
        samples: vec![value; samples],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: index * 100,
    }
}

async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn records_one_chunk_per_duration_while_signal_high() {
    let (frame_tx, frame_rx) = mpsc::channel(256);
    let (_signal_tx, signal_rx) = watch::channel(true);
    let (chunk_tx, mut chunk_rx) = mpsc::channel(8);

    let recorder = ChunkRecorder::new(config());
    tokio::spawn(recorder.run(frame_rx, signal_rx, chunk_tx));

    // 1 second of audio in 100ms frames
    for i in 0..10 {
        frame_tx.send(frame(i, 1600, 7)).await.unwrap();
    }

    let wav = chunk_rx.recv().await.expect("one chunk");

    let reader = hound::WavReader::new(Cursor::new(wav)).expect("valid WAV");
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);

    let samples: Vec<i16> = reader.into_samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(samples.len(), 16000);
    assert!(samples.iter().all(|&s| s == 7));
}

#[tokio::test(start_paused = true)]
async fn no_chunks_while_signal_low() {
    let (frame_tx, frame_rx) = mpsc::channel(256);
    let (_signal_tx, signal_rx) = watch::channel(false);
    let (chunk_tx, mut chunk_rx) = mpsc::channel(8);

    let recorder = ChunkRecorder::new(config());
    tokio::spawn(recorder.run(frame_rx, signal_rx, chunk_tx));

    for i in 0..20 {
        frame_tx.send(frame(i, 1600, 1)).await.unwrap();
    }

    let outcome = tokio::time::timeout(Duration::from_secs(10), chunk_rx.recv()).await;
    assert!(outcome.is_err(), "suspended recorder must not emit chunks");
}

#[tokio::test(start_paused = true)]
async fn partial_chunk_is_discarded_on_suspension() {
    let (frame_tx, frame_rx) = mpsc::channel(256);
    let (signal_tx, signal_rx) = watch::channel(true);
    let (chunk_tx, mut chunk_rx) = mpsc::channel(8);

    let recorder = ChunkRecorder::new(config());
    tokio::spawn(recorder.run(frame_rx, signal_rx, chunk_tx));

    // Half a chunk, then the coordinator suspends capture
    for i in 0..5 {
        frame_tx.send(frame(i, 1600, 1)).await.unwrap();
    }
    settle().await;
    signal_tx.send_replace(false);
    settle().await;

    // Resume: a fresh full chunk should contain only the new audio
    signal_tx.send_replace(true);
    for i in 0..10 {
        frame_tx.send(frame(5 + i, 1600, 2)).await.unwrap();
    }

    let wav = chunk_rx.recv().await.expect("one chunk after resume");
    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let samples: Vec<i16> = reader.into_samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(samples.len(), 16000);
    assert!(
        samples.iter().all(|&s| s == 2),
        "pre-suspension audio must not leak into the next chunk"
    );
}

#[tokio::test(start_paused = true)]
async fn stream_end_flushes_final_partial_chunk_and_stops() {
    let (frame_tx, frame_rx) = mpsc::channel(256);
    let (_signal_tx, signal_rx) = watch::channel(true);
    let (chunk_tx, mut chunk_rx) = mpsc::channel(8);

    let recorder = ChunkRecorder::new(config());
    let mut state = recorder.state();
    let run = tokio::spawn(recorder.run(frame_rx, signal_rx, chunk_tx));

    for i in 0..3 {
        frame_tx.send(frame(i, 1600, 9)).await.unwrap();
    }
    drop(frame_tx);

    let wav = chunk_rx.recv().await.expect("final partial chunk");
    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let samples: Vec<i16> = reader.into_samples::<i16>().map(Result::unwrap).collect();
    assert_eq!(samples.len(), 4800);

    let produced = run.await.unwrap().unwrap();
    assert_eq!(produced, 1);
    assert_eq!(*state.borrow_and_update(), RecorderState::Stopped);
}
