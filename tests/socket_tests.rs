// SessionSocket tests against a real in-process WebSocket server.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use scribe_live::{AuthToken, SessionError, SessionSocket, SocketEvent};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

const FINAL_FRAME: &str = r#"{"type":"final","session_id":"abc123","transcription":"hello","length":5,"words":1,"duration_seconds":2,"language":"en","model_used":"faster-whisper-tiny"}"#;

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}/ws/transcribe", listener.local_addr().unwrap());
    (listener, endpoint)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

#[tokio::test]
async fn partials_arrive_in_order_then_final_closes_dispatch() {
    let (listener, endpoint) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        ws.send(Message::Text(r#"{"type":"partial","partial":"hel"}"#.into()))
            .await
            .unwrap();
        ws.send(Message::Text(r#"{"type":"partial","partial":"lo"}"#.into()))
            .await
            .unwrap();
        ws.send(Message::Text(FINAL_FRAME.into())).await.unwrap();
        // Traffic after the final frame must not be dispatched.
        let _ = ws
            .send(Message::Text(r#"{"type":"partial","partial":"late"}"#.into()))
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    });

    let (socket, mut events) = SessionSocket::connect(&endpoint, &AuthToken::new("secret"))
        .await
        .unwrap();

    match events.recv().await.unwrap() {
        SocketEvent::Partial(text) => assert_eq!(text, "hel"),
        other => panic!("unexpected event: {:?}", other),
    }
    match events.recv().await.unwrap() {
        SocketEvent::Partial(text) => assert_eq!(text, "lo"),
        other => panic!("unexpected event: {:?}", other),
    }
    match events.recv().await.unwrap() {
        SocketEvent::Final(payload) => {
            assert_eq!(payload.session_id.as_deref(), Some("abc123"));
            assert_eq!(payload.transcription, "hello");
        }
        other => panic!("unexpected event: {:?}", other),
    }

    // The reader stopped at the terminal event; the channel just closes.
    assert!(events.recv().await.is_none());
    assert!(!socket.is_connected());

    server.await.unwrap();
}

#[tokio::test]
async fn transport_drop_surfaces_single_connection_error() {
    let (listener, endpoint) = bind().await;

    let server = tokio::spawn(async move {
        let ws = accept(&listener).await;
        // Tear the connection down without a close handshake.
        drop(ws);
    });

    let (mut socket, mut events) = SessionSocket::connect(&endpoint, &AuthToken::new("secret"))
        .await
        .unwrap();

    match events.recv().await.unwrap() {
        SocketEvent::Error(reason) => assert_eq!(reason, "Connection error"),
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(events.recv().await.is_none());

    // Sending on a closed socket is a quiet no-op.
    socket.send_audio(vec![1, 2, 3]).await;
    assert!(!socket.is_connected());

    server.await.unwrap();
}

#[tokio::test]
async fn audio_is_binary_and_stop_is_sent_once() {
    let (listener, endpoint) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        let mut received = Vec::new();
        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                Message::Close(_) => break,
                other => received.push(other),
            }
        }
        received
    });

    let (mut socket, _events) = SessionSocket::connect(&endpoint, &AuthToken::new("secret"))
        .await
        .unwrap();

    socket.send_audio(vec![1, 2, 3]).await;
    socket.send_stop().await;
    socket.send_stop().await; // valid once per connection
    socket.disconnect().await;
    socket.disconnect().await; // idempotent

    let received = server.await.unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0], Message::Binary(vec![1, 2, 3]));
    assert_eq!(received[1], Message::Text(r#"{"type":"stop"}"#.into()));
}

#[tokio::test]
async fn local_disconnect_emits_no_error_event() {
    let (listener, endpoint) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        // Drain until the client goes away.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (mut socket, mut events) = SessionSocket::connect(&endpoint, &AuthToken::new("secret"))
        .await
        .unwrap();

    socket.disconnect().await;
    assert!(!socket.is_connected());

    // A locally initiated close is not a transport error.
    assert!(events.recv().await.is_none());

    server.await.unwrap();
}

#[tokio::test]
async fn connection_refused_is_connection_failed() {
    let (listener, endpoint) = bind().await;
    drop(listener);

    match SessionSocket::connect(&endpoint, &AuthToken::new("secret")).await {
        Err(SessionError::ConnectionFailed(_)) => {}
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("connect should have failed"),
    }
}

#[tokio::test]
async fn handshake_rejection_is_connection_failed() {
    let (listener, endpoint) = bind().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        // Refuse the upgrade the way the backend refuses a bad token.
        let rejected =
            tokio_tungstenite::accept_hdr_async(stream, |_req: &Request, _res: Response| {
                let mut response = ErrorResponse::new(Some("invalid token".to_string()));
                *response.status_mut() = StatusCode::FORBIDDEN;
                Err(response)
            })
            .await;
        assert!(rejected.is_err());
    });

    match SessionSocket::connect(&endpoint, &AuthToken::new("bad")).await {
        Err(SessionError::ConnectionFailed(_)) => {}
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("handshake should have been rejected"),
    }

    server.await.unwrap();
}
