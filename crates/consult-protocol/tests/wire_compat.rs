// Verify wire format matches the documented client/server contract.
// These tests ensure the signaling protocol is never broken silently.

use consult_protocol::frames::{ClientFrame, InboundPeek, ServerFrame};

#[test]
fn join_frame_round_trip() {
    let json = r#"{"type":"join","room":"room-42","nickname":"agent-kim"}"#;
    let frame: ClientFrame = serde_json::from_str(json).unwrap();
    match frame {
        ClientFrame::Join { room, nickname } => {
            assert_eq!(room, "room-42");
            assert_eq!(nickname, "agent-kim");
        }
        _ => panic!("expected join frame"),
    }
}

#[test]
fn transcript_frame_optional_confidence() {
    let json = r#"{"type":"transcript","speaker":"customer","text":"hi","ts":"2026-07-28T00:00:00Z"}"#;
    let frame: ClientFrame = serde_json::from_str(json).unwrap();
    match frame {
        ClientFrame::Transcript { confidence, .. } => assert!(confidence.is_none()),
        _ => panic!("expected transcript frame"),
    }
}

#[test]
fn offer_frame_serializes_kebab_case_type() {
    let frame = ServerFrame::Offer {
        from: "peer-1".into(),
        payload: serde_json::json!({"sdp": "v=0"}),
    };
    let json = serde_json::to_string(&frame).unwrap();
    assert!(json.contains(r#""type":"offer""#));
    assert!(json.contains(r#""from":"peer-1""#));
}

#[test]
fn agent_result_frame_carries_turn_id() {
    let frame = ServerFrame::AgentResult {
        kind: "sentiment".into(),
        turn_id: 7,
        payload: serde_json::json!({"valence": -0.4}),
    };
    let json = serde_json::to_string(&frame).unwrap();
    assert!(json.contains(r#""turn_id":7"#));
    assert!(json.contains(r#""kind":"sentiment""#));
}

#[test]
fn error_frame_helper_matches_manual_construction() {
    let a = ServerFrame::error("overloaded", "room mailbox full");
    let b = ServerFrame::Error {
        code: "overloaded".into(),
        message: "room mailbox full".into(),
    };
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn inbound_peek_reads_type_without_full_parse() {
    let json = r#"{"type":"leave"}"#;
    let peek: InboundPeek = serde_json::from_str(json).unwrap();
    assert_eq!(peek.frame_type, "leave");
}

#[test]
fn unknown_client_frame_type_fails_to_parse() {
    let json = r#"{"type":"teleport"}"#;
    assert!(serde_json::from_str::<ClientFrame>(json).is_err());
}
