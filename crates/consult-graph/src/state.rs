use std::collections::HashSet;
use std::sync::Arc;

use consult_core::config::GraphConfig;
use consult_core::types::{AnalysisResult, RoomName, SessionId, TranscriptTurn, TurnId};
use consult_llm::gateway::ChatGateway;
use consult_vectorstore::cache::SemanticCache;
use consult_vectorstore::manager::VectorStore;
use tokio::sync::Mutex as AsyncMutex;

/// Immutable view of a session handed to the graph for one invocation.
/// Built fresh by the caller (the room agent) from its own session state;
/// the graph never mutates it.
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub room: RoomName,
    /// Byte-identical system prompt prefix for this customer binding.
    pub static_prefix: String,
    pub prior_summary: String,
    /// Full transcript so far, oldest first.
    pub history: Vec<TranscriptTurn>,
    /// Turns with index > `last_summarized_index`, oldest first. May be
    /// empty — the summarize node treats that as "nothing new to roll
    /// forward" and skips its chat call, but the graph as a whole is still
    /// invoked on the triggering turn.
    pub new_turns: Vec<TranscriptTurn>,
    /// Count of turns already folded into `prior_summary`. Monotonically
    /// non-decreasing across a session's lifetime; `new_turns` is exactly
    /// `history[last_summarized_index..]`.
    pub last_summarized_index: usize,
}

/// Handles and config shared across every node invocation. Cheap to clone
/// (everything behind an `Arc`).
#[derive(Clone)]
pub struct GraphState {
    pub snapshot: Arc<SessionSnapshot>,
    pub chat: Arc<dyn ChatGateway>,
    pub vectorstore: Arc<dyn VectorStore>,
    pub faq_cache: Arc<SemanticCache>,
    pub config: Arc<GraphConfig>,
    /// Turn ids already analyzed by this session, across its whole
    /// lifetime — not reset per graph invocation. Guards against
    /// re-analyzing a turn if the room agent retries a dispatch.
    pub processed_turn_ids: Arc<AsyncMutex<HashSet<TurnId>>>,
}

impl GraphState {
    /// The turn that triggered this run — the latest entry in `new_turns`,
    /// falling back to the latest entry in `history` when the summarize
    /// window is empty (nothing new to roll forward, but the graph was
    /// still invoked on a turn already present in history).
    pub fn trigger_turn(&self) -> &TranscriptTurn {
        self.snapshot
            .new_turns
            .last()
            .or_else(|| self.snapshot.history.last())
            .expect("graph invoked with empty history")
    }

    pub fn latest_customer_text(&self) -> String {
        self.snapshot
            .new_turns
            .iter()
            .rev()
            .find(|t| t.speaker_role == consult_core::types::SpeakerRole::Customer)
            .map(|t| t.text.clone())
            .unwrap_or_else(|| self.trigger_turn().text.clone())
    }
}

/// What one branch produced for a turn: the updated rolling summary (only
/// the summarize node emits this) plus the `AnalysisResult` to publish.
pub enum NodePatch {
    Summary {
        summary: String,
        last_summarized_index: usize,
        result: AnalysisResult,
    },
    Result(AnalysisResult),
}

impl NodePatch {
    pub fn result(&self) -> &AnalysisResult {
        match self {
            NodePatch::Summary { result, .. } => result,
            NodePatch::Result(result) => result,
        }
    }
}
