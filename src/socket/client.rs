use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::messages::{ControlMessage, FinalPayload, ServerMessage};
use crate::auth::AuthToken;
use crate::error::SessionError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Inbound traffic surfaced by a session socket.
///
/// `Final` and `Error` are terminal: the reader stops at the first of them,
/// so at most one terminal event is ever delivered per connection.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    Partial(String),
    Final(FinalPayload),
    Error(String),
}

/// Transport half of a live transcription session
#[async_trait::async_trait]
pub trait TranscriptSocket: Send {
    /// Fire-and-forget; a no-op unless the socket is open
    async fn send_audio(&mut self, pcm: Vec<u8>);

    /// Transmit the stop control frame; valid once, later calls are no-ops
    async fn send_stop(&mut self);

    /// Close the transport; idempotent and safe from any state
    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}

/// Opens session sockets; the seam that lets tests substitute a fake transport
#[async_trait::async_trait]
pub trait SocketConnector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &str,
        token: &AuthToken,
    ) -> Result<(Box<dyn TranscriptSocket>, mpsc::Receiver<SocketEvent>), SessionError>;
}

/// Default connector producing real WebSocket-backed sockets
pub struct WsConnector;

#[async_trait::async_trait]
impl SocketConnector for WsConnector {
    async fn connect(
        &self,
        endpoint: &str,
        token: &AuthToken,
    ) -> Result<(Box<dyn TranscriptSocket>, mpsc::Receiver<SocketEvent>), SessionError> {
        let (socket, events) = SessionSocket::connect(endpoint, token).await?;
        Ok((Box::new(socket), events))
    }
}

/// One persistent WebSocket connection to the transcription backend
///
/// Owns the write half; a spawned reader task turns inbound frames into
/// `SocketEvent`s and stops at the first terminal one.
pub struct SessionSocket {
    sink: WsSink,
    open: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
    stop_sent: bool,
    reader: Option<JoinHandle<()>>,
}

impl SessionSocket {
    /// Connect to the backend, authenticating via the token in the query
    /// string. Resolves once the WebSocket handshake completes; any handshake
    /// failure (including HTTP-level auth rejection) is `ConnectionFailed`.
    pub async fn connect(
        endpoint: &str,
        token: &AuthToken,
    ) -> Result<(Self, mpsc::Receiver<SocketEvent>), SessionError> {
        let url = format!("{}?token={}", endpoint, token.as_str());
        info!("connecting to transcription backend at {}", endpoint);

        let (stream, _) = connect_async(&url)
            .await
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;

        let (sink, read) = stream.split();
        let open = Arc::new(AtomicBool::new(true));
        let closing = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = mpsc::channel(64);

        let reader = tokio::spawn(read_loop(
            read,
            event_tx,
            Arc::clone(&open),
            Arc::clone(&closing),
        ));

        Ok((
            Self {
                sink,
                open,
                closing,
                stop_sent: false,
                reader: Some(reader),
            },
            event_rx,
        ))
    }

    pub fn is_connected(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub async fn send_audio(&mut self, pcm: Vec<u8>) {
        if !self.is_connected() {
            debug!("socket not open, dropping {} byte audio frame", pcm.len());
            return;
        }

        if let Err(e) = self.sink.send(Message::Binary(pcm)).await {
            // The reader surfaces the transport error; sending stays silent.
            debug!("audio send failed: {}", e);
            self.open.store(false, Ordering::SeqCst);
        }
    }

    pub async fn send_stop(&mut self) {
        if self.stop_sent || !self.is_connected() {
            return;
        }
        self.stop_sent = true;

        let Ok(frame) = serde_json::to_string(&ControlMessage::Stop) else {
            return;
        };
        if let Err(e) = self.sink.send(Message::Text(frame)).await {
            debug!("stop frame send failed: {}", e);
            self.open.store(false, Ordering::SeqCst);
        }
    }

    pub async fn disconnect(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        let _ = self.sink.close().await;
    }
}

impl Drop for SessionSocket {
    fn drop(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

#[async_trait::async_trait]
impl TranscriptSocket for SessionSocket {
    async fn send_audio(&mut self, pcm: Vec<u8>) {
        SessionSocket::send_audio(self, pcm).await;
    }

    async fn send_stop(&mut self) {
        SessionSocket::send_stop(self).await;
    }

    async fn disconnect(&mut self) {
        SessionSocket::disconnect(self).await;
    }

    fn is_connected(&self) -> bool {
        SessionSocket::is_connected(self)
    }
}

async fn read_loop(
    mut read: SplitStream<WsStream>,
    events: mpsc::Sender<SocketEvent>,
    open: Arc<AtomicBool>,
    closing: Arc<AtomicBool>,
) {
    let terminal = loop {
        let msg = match read.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!("websocket transport error: {}", e);
                break Some(SocketEvent::Error("Connection error".into()));
            }
            None => break Some(SocketEvent::Error("Connection error".into())),
        };

        // A locally initiated close is not an error; stop dispatching.
        if closing.load(Ordering::SeqCst) {
            break None;
        }

        match msg {
            Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                Ok(ServerMessage::Partial { partial }) => {
                    if events.send(SocketEvent::Partial(partial)).await.is_err() {
                        break None;
                    }
                }
                Ok(ServerMessage::Final(payload)) => break Some(SocketEvent::Final(payload)),
                Err(e) => debug!("ignoring unparseable frame: {}", e),
            },
            Message::Close(frame) => {
                if let Some(frame) = frame {
                    debug!("websocket closed by server: {} {}", frame.code, frame.reason);
                }
                break Some(SocketEvent::Error("Connection error".into()));
            }
            _ => {}
        }
    };

    open.store(false, Ordering::SeqCst);
    if !closing.load(Ordering::SeqCst) {
        if let Some(event) = terminal {
            let _ = events.send(event).await;
        }
    }
}
