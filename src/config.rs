use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::audio::CaptureConfig;
use crate::session::{ChunkBackpressure, SessionConfig};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub transcription: TranscriptionConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub endpoint: String,
    pub connect_timeout_secs: u64,
    pub finalize_timeout_secs: u64,
    pub backpressure: ChunkBackpressure,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8000/ws/transcribe".to_string(),
            connect_timeout_secs: 10,
            finalize_timeout_secs: 30,
            backpressure: ChunkBackpressure::Drop,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_interval_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz, what the backend's model expects
            channels: 1,        // Mono
            chunk_interval_ms: 100,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Session parameters for one recording attempt
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            endpoint: self.transcription.endpoint.clone(),
            capture: CaptureConfig {
                sample_rate: self.audio.sample_rate,
                channels: self.audio.channels,
                chunk_interval: Duration::from_millis(self.audio.chunk_interval_ms),
            },
            connect_timeout: Duration::from_secs(self.transcription.connect_timeout_secs),
            finalize_timeout: Duration::from_secs(self.transcription.finalize_timeout_secs),
            backpressure: self.transcription.backpressure,
        }
    }
}
