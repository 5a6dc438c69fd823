use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::socket::FinalPayload;

/// Lifecycle of one recording session
///
/// `Finalizing` is the second half of the stop sequence: the stop control
/// frame has been sent and the final message is awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Acquiring,
    Streaming,
    Stopping,
    Finalizing,
    Finalized,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finalized | SessionState::Failed)
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Idle) && !self.is_terminal()
    }
}

/// Read-only view of a recording session, cheap to clone for the UI
#[derive(Debug, Clone, Serialize)]
pub struct RecordingSnapshot {
    pub state: SessionState,
    /// Ordered transcript fragments received so far
    pub partial_transcript: Vec<String>,
    /// Persisted record id, present only once finalization succeeded
    pub session_id: Option<String>,
    /// Last error, rendered for display
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl RecordingSnapshot {
    /// The text the UI displays: fragments concatenated in arrival order,
    /// with no separator inserted (fragments carry their own spacing).
    pub fn partial_text(&self) -> String {
        self.partial_transcript.concat()
    }
}

/// Summary of a successfully finalized recording, as persisted by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedSession {
    /// Backend record id; null when the backend failed to persist without
    /// reporting an in-band error
    pub session_id: Option<String>,
    pub transcript: String,
    pub word_count: u64,
    pub duration_seconds: u64,
    pub language: String,
    pub model_used: String,
}

impl From<FinalPayload> for FinalizedSession {
    fn from(payload: FinalPayload) -> Self {
        Self {
            session_id: payload.session_id,
            transcript: payload.transcription,
            word_count: payload.words,
            duration_seconds: payload.duration_seconds,
            language: payload.language,
            model_used: payload.model_used,
        }
    }
}

/// Best-effort notifications pushed to the UI
///
/// Delivery is non-blocking; `RecordingController::snapshot` is the source of
/// truth if the channel lags.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    StateChanged(SessionState),
    Partial { fragment: String },
    Finalized(FinalizedSession),
    Failed(SessionError),
}
