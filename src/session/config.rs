use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::CaptureConfig;

/// Configuration for a recording session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket endpoint of the transcription backend
    pub endpoint: String,

    /// Audio capture parameters
    pub capture: CaptureConfig,

    /// How long to wait for the socket handshake before failing the session
    pub connect_timeout: Duration,

    /// How long to wait for the final message after the stop frame is sent
    pub finalize_timeout: Duration,

    /// What to do with chunks produced while the socket is not open
    pub backpressure: ChunkBackpressure,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8000/ws/transcribe".to_string(),
            capture: CaptureConfig::default(),
            connect_timeout: Duration::from_secs(10),
            finalize_timeout: Duration::from_secs(30),
            backpressure: ChunkBackpressure::Drop,
        }
    }
}

/// Policy for audio chunks that arrive while the socket is not open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkBackpressure {
    /// Discard them (the observed upstream behavior)
    Drop,
    /// Hold them and flush if the send window reopens on this connection
    Buffer,
}
