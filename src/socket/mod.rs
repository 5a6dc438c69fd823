//! WebSocket session transport
//!
//! One connection per recording session: binary audio frames and a single
//! stop control frame go out, partial/final JSON frames come back as one
//! typed event stream.

mod client;
mod messages;

pub use client::{SessionSocket, SocketConnector, SocketEvent, TranscriptSocket, WsConnector};
pub use messages::{ControlMessage, FinalPayload, ServerMessage};
