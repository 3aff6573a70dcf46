use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Summary of a peer returned in a `joined` frame's roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerSummary {
    pub peer_id: String,
    pub nickname: String,
}

/// Client → Server frames on the signaling WebSocket.
/// Wire: `{ "type": "join", "room": "...", "nickname": "..." }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    Join {
        room: String,
        nickname: String,
    },
    Leave,
    Offer {
        to: String,
        payload: Value,
    },
    Answer {
        to: String,
        payload: Value,
    },
    Ice {
        to: String,
        payload: Value,
    },
    Transcript {
        speaker: String,
        text: String,
        ts: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
    },
}

/// Server → Client frames on the signaling WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerFrame {
    Joined {
        peer_id: String,
        peers: Vec<PeerSummary>,
    },
    PeerJoined {
        peer_id: String,
        nickname: String,
    },
    PeerLeft {
        peer_id: String,
    },
    Offer {
        from: String,
        payload: Value,
    },
    Answer {
        from: String,
        payload: Value,
    },
    Ice {
        from: String,
        payload: Value,
    },
    AgentResult {
        kind: String,
        turn_id: u64,
        payload: Value,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerFrame {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerFrame::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Raw inbound frame used only to peek the `type` discriminator before
/// committing to a full `ClientFrame` parse, so an unrecognized `type`
/// can be reported as a clean `bad_request` rather than a serde error.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundPeek {
    #[serde(rename = "type")]
    pub frame_type: String,
}
