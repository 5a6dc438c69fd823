// Wire protocol tests: the JSON frames exchanged with the backend.

use scribe_live::{ControlMessage, ServerMessage};

#[test]
fn parses_partial_frame() {
    let msg: ServerMessage =
        serde_json::from_str(r#"{"type":"partial","partial":"hel"}"#).unwrap();

    assert_eq!(
        msg,
        ServerMessage::Partial {
            partial: "hel".to_string()
        }
    );
}

#[test]
fn parses_final_frame() {
    let raw = r#"{
        "type": "final",
        "session_id": "abc123",
        "transcription": "hello world",
        "length": 11,
        "words": 2,
        "duration_seconds": 3,
        "language": "en",
        "model_used": "faster-whisper-tiny"
    }"#;

    let msg: ServerMessage = serde_json::from_str(raw).unwrap();
    let ServerMessage::Final(payload) = msg else {
        panic!("expected a final frame");
    };

    assert_eq!(payload.session_id.as_deref(), Some("abc123"));
    assert_eq!(payload.transcription, "hello world");
    assert_eq!(payload.length, 11);
    assert_eq!(payload.words, 2);
    assert_eq!(payload.duration_seconds, 3);
    assert_eq!(payload.language, "en");
    assert_eq!(payload.model_used, "faster-whisper-tiny");
    assert_eq!(payload.error, None);
}

#[test]
fn final_frame_error_field_is_preserved() {
    let raw = r#"{
        "type": "final",
        "session_id": null,
        "transcription": "",
        "length": 0,
        "words": 0,
        "duration_seconds": 1,
        "language": "en",
        "model_used": "faster-whisper-tiny",
        "error": "model crashed"
    }"#;

    let msg: ServerMessage = serde_json::from_str(raw).unwrap();
    let ServerMessage::Final(payload) = msg else {
        panic!("expected a final frame");
    };

    assert_eq!(payload.error.as_deref(), Some("model crashed"));
    assert_eq!(payload.session_id, None);
}

#[test]
fn final_frame_null_session_id_means_unsaved() {
    // The backend reports a null id when the record could not be persisted
    // even though the session closed normally.
    let raw = r#"{"type":"final","session_id":null,"transcription":"hi","length":2,
                  "words":1,"duration_seconds":1,"language":"en","model_used":"m"}"#;

    let msg: ServerMessage = serde_json::from_str(raw).unwrap();
    let ServerMessage::Final(payload) = msg else {
        panic!("expected a final frame");
    };

    assert_eq!(payload.session_id, None);
    assert_eq!(payload.error, None);
}

#[test]
fn unknown_frame_type_fails_to_parse() {
    let result = serde_json::from_str::<ServerMessage>(r#"{"type":"bogus","data":1}"#);
    assert!(result.is_err());
}

#[test]
fn stop_control_frame_wire_shape() {
    let frame = serde_json::to_string(&ControlMessage::Stop).unwrap();
    assert_eq!(frame, r#"{"type":"stop"}"#);
}
