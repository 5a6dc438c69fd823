use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::CaptureError;

/// One captured slice of audio (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioChunk {
    /// Little-endian PCM bytes, the form audio takes on the wire.
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Configuration for an audio capture source
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (device audio is decimated if needed)
    pub sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub channels: u16,
    /// How much audio each chunk covers (affects latency)
    pub chunk_interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz, what the transcription backend expects
            channels: 1,        // Mono
            chunk_interval: Duration::from_millis(100),
        }
    }
}

/// Audio capture source trait
///
/// Implementations:
/// - Microphone: cpal default input device (all platforms)
/// - Test fakes: channel-backed sources driven by a harness
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that delivers chunks in strict temporal
    /// order. `config.chunk_interval` must be non-zero. Starting an already
    /// started source is an error; a denied or missing device surfaces as an
    /// error, never a silent no-op.
    async fn start(
        &mut self,
        config: CaptureConfig,
    ) -> Result<mpsc::Receiver<AudioChunk>, CaptureError>;

    /// Stop capturing and release the device
    ///
    /// No chunk is produced after this returns. Stopping a source that is not
    /// capturing is a no-op.
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Check if the source is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get source name for logging
    fn name(&self) -> &str;
}
