use serde::{Deserialize, Serialize};

/// Control frame sent client -> server
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Request finalization: `{"type":"stop"}`
    Stop,
}

/// JSON frames received server -> client
///
/// Audio flows the other way as raw binary frames and has no JSON form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Incremental transcript fragment for the in-progress utterance
    Partial { partial: String },
    /// Terminal frame carrying the persisted record
    Final(FinalPayload),
}

/// Payload of the single terminal `final` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalPayload {
    /// Persisted record id; the backend reports null when persistence failed
    #[serde(default)]
    pub session_id: Option<String>,
    pub transcription: String,
    /// Transcript length in characters
    #[serde(default)]
    pub length: u64,
    /// Word count
    #[serde(default)]
    pub words: u64,
    #[serde(default)]
    pub duration_seconds: u64,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub model_used: String,
    /// Present when the session failed server-side; the connection still
    /// closes normally in that case
    #[serde(default)]
    pub error: Option<String>,
}
