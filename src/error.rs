//! Error types surfaced by the streaming client.

use thiserror::Error;

/// Error surfaced to the UI for one recording attempt.
///
/// None of these are retried automatically; recovery is a user-initiated new
/// session. Cloneable so a terminal outcome can be stored on the session and
/// handed back from repeated `stop()` calls.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("no auth token available at session start")]
    MissingCredential,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("server failed to finalize the session: {0}")]
    ServerFinalization(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("a recording session is already active")]
    AlreadyRecording,

    #[error("no recording session is active")]
    NotRecording,

    #[error("audio capture error: {0}")]
    Capture(#[from] CaptureError),
}

/// Audio capture device errors
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("already capturing")]
    AlreadyCapturing,

    #[error("chunk interval must be a positive duration")]
    InvalidInterval,

    #[error("no audio input device available")]
    NoInputDevice,

    #[error("audio device permission denied: {0}")]
    PermissionDenied(String),

    #[error("failed to build audio stream: {0}")]
    StreamBuild(String),

    #[error("failed to start audio stream: {0}")]
    StreamPlay(String),
}
