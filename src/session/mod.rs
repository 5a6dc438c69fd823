//! Recording session management
//!
//! This module provides the `RecordingController` abstraction that manages:
//! - Microphone acquisition and chunked audio capture
//! - Streaming audio to the transcription backend over one session socket
//! - Partial transcript accumulation and UI notification
//! - The live -> finalized/failed session state machine

mod config;
mod controller;
mod state;

pub use config::{ChunkBackpressure, SessionConfig};
pub use controller::RecordingController;
pub use state::{FinalizedSession, RecordingSnapshot, SessionState, SessionUpdate};
