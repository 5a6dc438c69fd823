// Unit tests for the audio capture types and interface guards.

use std::time::Duration;

use scribe_live::{AudioChunk, CaptureConfig, CaptureError, CaptureSource, MicSource};

#[test]
fn capture_config_default_matches_backend_expectations() {
    let config = CaptureConfig::default();

    assert_eq!(config.sample_rate, 16000, "backend expects 16kHz");
    assert_eq!(config.channels, 1, "backend expects mono");
    assert_eq!(config.chunk_interval, Duration::from_millis(100));
}

#[test]
fn audio_chunk_pcm_bytes_are_little_endian() {
    let chunk = AudioChunk {
        samples: vec![1, -2, 300],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    };

    assert_eq!(chunk.to_pcm_bytes(), vec![1, 0, 254, 255, 44, 1]);
}

#[test]
fn audio_chunk_stereo_interleaved_frame_count() {
    // Stereo samples are interleaved [L, R, L, R, ...]
    let chunk = AudioChunk {
        samples: vec![100, 200, 150, 250, 175, 275],
        sample_rate: 44100,
        channels: 2,
        timestamp_ms: 0,
    };

    let frames = chunk.samples.len() / chunk.channels as usize;
    assert_eq!(frames, 3);
}

#[tokio::test]
async fn zero_chunk_interval_is_rejected() {
    let mut source = MicSource::new();
    let config = CaptureConfig {
        chunk_interval: Duration::ZERO,
        ..CaptureConfig::default()
    };

    let result = source.start(config).await;
    assert!(matches!(result, Err(CaptureError::InvalidInterval)));
    assert!(!source.is_capturing());
}

#[tokio::test]
async fn stop_without_start_is_a_noop() {
    let mut source = MicSource::new();
    source.stop().await.unwrap();
    assert!(!source.is_capturing());
}
