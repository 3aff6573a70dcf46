use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Name of a consultation room. Caller-supplied, not generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomName(pub String);

impl RoomName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoomName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoomName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-connection peer identifier (random UUID, not persisted).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic per-session turn counter, assigned by the room agent at
/// transcript-append time. Not globally unique — unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a consultation session (UUIDv7 — time-sortable for log correlation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is hinted to have produced a transcript turn. Inferred from the
/// client-supplied `speaker` field, not verified against identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    Agent,
    Customer,
    #[default]
    Unknown,
}

impl fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeakerRole::Agent => write!(f, "agent"),
            SpeakerRole::Customer => write!(f, "customer"),
            SpeakerRole::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for SpeakerRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "agent" => Ok(SpeakerRole::Agent),
            "customer" => Ok(SpeakerRole::Customer),
            "unknown" => Ok(SpeakerRole::Unknown),
            other => Err(format!("unknown speaker role: {}", other)),
        }
    }
}

/// Hint about a signaling peer's role within the room, distinct from
/// `SpeakerRole` (which applies to transcript turns, not connections).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoleHint {
    Agent,
    Customer,
    #[default]
    Unknown,
}

/// The fixed set of analysis-graph branches. Every `AnalysisResult` carries
/// exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Summary,
    Intent,
    Sentiment,
    Rag,
    Faq,
    Risk,
    Draft,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResultKind::Summary => "summary",
            ResultKind::Intent => "intent",
            ResultKind::Sentiment => "sentiment",
            ResultKind::Rag => "rag",
            ResultKind::Faq => "faq",
            ResultKind::Risk => "risk",
            ResultKind::Draft => "draft",
        };
        write!(f, "{}", s)
    }
}

/// A single immutable line of the room transcript. Once constructed, never
/// mutated — correcting a turn means appending a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub turn_id: TurnId,
    pub speaker_role: SpeakerRole,
    pub speaker_name: String,
    pub text: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub confidence: Option<f32>,
}

/// One branch's output for one turn. `payload` carries either the node's
/// structured success value or an error code when the branch failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub session_id: SessionId,
    pub turn_id: TurnId,
    pub kind: ResultKind,
    pub payload: ResultPayload,
    pub produced_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultPayload {
    Ok(serde_json::Value),
    Err { error_code: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_round_trips_through_display() {
        let id = PeerId::new();
        assert_eq!(id.to_string(), id.as_str());
    }

    #[test]
    fn speaker_role_parses_back() {
        for role in [SpeakerRole::Agent, SpeakerRole::Customer, SpeakerRole::Unknown] {
            let parsed: SpeakerRole = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn speaker_role_rejects_unknown_string() {
        assert!("bogus".parse::<SpeakerRole>().is_err());
    }
}
