use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use consult_core::config::GraphConfig;
use consult_core::types::{
    AnalysisResult, RoomName, SessionId, SpeakerRole, TranscriptTurn, TurnId,
};
use consult_graph::state::{GraphState, SessionSnapshot};
use consult_graph::runtime::run_graph;
use consult_llm::gateway::ChatGateway;
use consult_repo::SessionRepo;
use consult_vectorstore::cache::SemanticCache;
use consult_vectorstore::manager::VectorStore;
use tokio::sync::{broadcast, mpsc, Mutex as AsyncMutex, RwLock};
use tracing::{info, warn};

use crate::error::AgentError;
use crate::mailbox::{AgentCommand, Mailbox};

const RESULTS_CHANNEL_CAPACITY: usize = 256;

/// One consultation session's private analysis actor. Exactly one per
/// room, for the room's whole lifetime — owns the rolling summary, the
/// static system-prompt prefix, and per-turn dedup state that the
/// analysis graph is handed fresh on every invocation.
pub struct RoomAgent {
    session_id: SessionId,
    room: RoomName,
    repo: Arc<SessionRepo>,
    chat: Arc<dyn ChatGateway>,
    vectorstore: Arc<dyn VectorStore>,
    faq_cache: Arc<SemanticCache>,
    config: Arc<GraphConfig>,

    static_prefix: RwLock<String>,
    customer_fingerprint: RwLock<Option<String>>,
    prior_summary: AsyncMutex<String>,
    history: AsyncMutex<Vec<TranscriptTurn>>,
    /// Count of turns already folded into `prior_summary`. Drives which
    /// slice of `history` becomes `new_turns` on the next graph run.
    last_summarized_index: AsyncMutex<usize>,
    processed_turn_ids: Arc<AsyncMutex<HashSet<TurnId>>>,
    next_turn_id: Arc<AtomicU64>,

    results_tx: broadcast::Sender<AnalysisResult>,
}

/// Handle a caller uses to talk to a running room agent. Cloneable — the
/// hub hands one to every connection serving that room.
#[derive(Clone)]
pub struct RoomAgentHandle {
    mailbox: Arc<Mailbox>,
    results_tx: broadcast::Sender<AnalysisResult>,
    next_turn_id: Arc<AtomicU64>,
    pub session_id: SessionId,
}

impl RoomAgentHandle {
    /// Assigns the next turn id and enqueues the turn for analysis.
    /// Returns immediately — the graph runs on the agent's own task.
    pub async fn submit_transcript(
        &self,
        speaker_role: SpeakerRole,
        speaker_name: String,
        text: String,
        confidence: Option<f32>,
    ) -> Result<TurnId, AgentError> {
        let turn_id = TurnId(self.next_turn_id.fetch_add(1, Ordering::SeqCst));
        let turn = TranscriptTurn {
            turn_id,
            speaker_role,
            speaker_name,
            text,
            timestamp: Utc::now(),
            confidence,
        };
        self.mailbox.push(AgentCommand::Transcript(turn)).await?;
        Ok(turn_id)
    }

    /// Rewrites the static system-prompt prefix only if `fingerprint`
    /// differs from the one currently bound — keeps the prefix
    /// byte-identical across turns for the same customer.
    pub async fn set_customer_context(
        &self,
        fingerprint: String,
        prefix: String,
    ) -> Result<(), AgentError> {
        self.mailbox
            .push(AgentCommand::SetCustomerContext { fingerprint, prefix })
            .await
    }

    pub async fn reset(&self) -> Result<(), AgentError> {
        self.mailbox.push(AgentCommand::Reset).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisResult> {
        self.results_tx.subscribe()
    }
}

impl RoomAgent {
    pub fn new(
        session_id: SessionId,
        room: RoomName,
        repo: Arc<SessionRepo>,
        chat: Arc<dyn ChatGateway>,
        vectorstore: Arc<dyn VectorStore>,
        faq_cache: Arc<SemanticCache>,
        config: Arc<GraphConfig>,
    ) -> Self {
        let (results_tx, _) = broadcast::channel(RESULTS_CHANNEL_CAPACITY);
        Self {
            session_id,
            room,
            repo,
            chat,
            vectorstore,
            faq_cache,
            config,
            static_prefix: RwLock::new(String::new()),
            customer_fingerprint: RwLock::new(None),
            prior_summary: AsyncMutex::new(String::new()),
            history: AsyncMutex::new(Vec::new()),
            last_summarized_index: AsyncMutex::new(0),
            processed_turn_ids: Arc::new(AsyncMutex::new(HashSet::new())),
            next_turn_id: Arc::new(AtomicU64::new(1)),
            results_tx,
        }
    }

    /// Spawns the agent's actor task and returns a cloneable handle to it.
    /// `mailbox_capacity` comes from `RoomsConfig::mailbox_capacity`.
    pub fn spawn(self, mailbox_capacity: usize) -> (Arc<RoomAgent>, RoomAgentHandle) {
        let agent = Arc::new(self);
        let mailbox = Mailbox::new(mailbox_capacity);
        let handle = RoomAgentHandle {
            mailbox: mailbox.clone(),
            results_tx: agent.results_tx.clone(),
            next_turn_id: agent.next_turn_id.clone(),
            session_id: agent.session_id.clone(),
        };

        let worker_agent = agent.clone();
        let worker_mailbox = mailbox.clone();
        tokio::spawn(async move {
            loop {
                let command = worker_mailbox.pop().await;
                worker_agent.handle_command(command).await;
            }
        });

        (agent, handle)
    }

    async fn handle_command(&self, command: AgentCommand) {
        match command {
            AgentCommand::Transcript(turn) => self.on_new_transcript(turn).await,
            AgentCommand::SetCustomerContext { fingerprint, prefix } => {
                self.apply_customer_context(fingerprint, prefix).await
            }
            AgentCommand::Reset => self.apply_reset().await,
        }
    }

    async fn on_new_transcript(&self, turn: TranscriptTurn) {
        if let Err(err) = self.repo.append_turn(&self.session_id, &turn) {
            warn!(error = %err, "failed to persist transcript turn");
        }

        if turn.speaker_role != SpeakerRole::Customer {
            self.history.lock().await.push(turn);
            return;
        }

        let mut history = self.history.lock().await;
        history.push(turn.clone());
        let history_snapshot = history.clone();
        drop(history);

        let prior_summary = self.prior_summary.lock().await.clone();
        let static_prefix = self.static_prefix.read().await.clone();
        let last_summarized_index = *self.last_summarized_index.lock().await;
        let new_turns = history_snapshot
            .get(last_summarized_index..)
            .map(|s| s.to_vec())
            .unwrap_or_default();

        let snapshot = Arc::new(SessionSnapshot {
            session_id: self.session_id.clone(),
            room: self.room.clone(),
            static_prefix,
            prior_summary,
            history: history_snapshot,
            new_turns,
            last_summarized_index,
        });

        let state = Arc::new(GraphState {
            snapshot,
            chat: self.chat.clone(),
            vectorstore: self.vectorstore.clone(),
            faq_cache: self.faq_cache.clone(),
            config: self.config.clone(),
            processed_turn_ids: self.processed_turn_ids.clone(),
        });

        let (patches_tx, mut patches_rx) = mpsc::channel(16);
        let repo = self.repo.clone();
        let forward_task = tokio::spawn(async move {
            while let Some(result) = patches_rx.recv().await {
                if let Err(err) = repo.save_result(&result) {
                    warn!(error = %err, "failed to persist analysis result");
                }
            }
        });

        let outcome = run_graph(state, patches_tx).await;
        let _ = forward_task.await;

        for result in &outcome.results {
            let _ = self.results_tx.send(result.clone());
        }

        if let Some(summary) = outcome.updated_summary {
            *self.prior_summary.lock().await = summary.clone();
            if let Err(err) = self.repo.update_summary(&self.session_id, &summary) {
                warn!(error = %err, "failed to persist rolling summary");
            }
        }
        if let Some(index) = outcome.updated_last_summarized_index {
            *self.last_summarized_index.lock().await = index;
        }

        info!(
            turn_id = %turn.turn_id,
            results = outcome.results.len(),
            "analyzed transcript turn"
        );
    }

    async fn apply_customer_context(&self, fingerprint: String, prefix: String) {
        let current = self.customer_fingerprint.read().await.clone();
        if current.as_deref() == Some(fingerprint.as_str()) {
            return;
        }
        *self.static_prefix.write().await = prefix;
        *self.customer_fingerprint.write().await = Some(fingerprint);
    }

    async fn apply_reset(&self) {
        *self.prior_summary.lock().await = String::new();
        self.history.lock().await.clear();
        *self.last_summarized_index.lock().await = 0;
        self.processed_turn_ids.lock().await.clear();
        *self.customer_fingerprint.write().await = None;
        *self.static_prefix.write().await = String::new();
    }
}
