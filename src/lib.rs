pub mod audio;
pub mod auth;
pub mod config;
pub mod error;
pub mod session;
pub mod socket;

pub use audio::{AudioChunk, CaptureConfig, CaptureSource, MicSource};
pub use auth::AuthToken;
pub use config::Config;
pub use error::{CaptureError, SessionError};
pub use session::{
    ChunkBackpressure, FinalizedSession, RecordingController, RecordingSnapshot, SessionConfig,
    SessionState, SessionUpdate,
};
pub use socket::{
    ControlMessage, FinalPayload, ServerMessage, SessionSocket, SocketConnector, SocketEvent,
    TranscriptSocket, WsConnector,
};
