use std::collections::HashMap;
use std::sync::Arc;

use consult_agent::agent::{RoomAgent, RoomAgentHandle};
use consult_core::config::ConsultConfig;
use consult_core::error::ConsultError;
use consult_core::types::{PeerId, RoomName, SessionId, SpeakerRole};
use consult_llm::gateway::ChatGateway;
use consult_protocol::frames::{PeerSummary, ServerFrame};
use consult_repo::SessionRepo;
use consult_vectorstore::cache::SemanticCache;
use consult_vectorstore::manager::VectorStore;
use dashmap::DashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

struct PeerHandle {
    nickname: String,
    sender: mpsc::Sender<ServerFrame>,
}

struct RoomState {
    peers: RwLock<HashMap<PeerId, PeerHandle>>,
}

/// Central shared state for the signaling + consultation hub. One `Hub`
/// per process; handed to every Axum handler behind an `Arc`.
///
/// Room membership (`rooms`) and the room's long-lived analysis actor
/// (`agents`) are tracked separately: a room's agent — and the session it
/// holds — outlives any particular peer roster. An empty room is dropped
/// from `rooms`, but its agent is kept so a reconnecting peer resumes the
/// same rolling summary instead of starting over.
pub struct Hub {
    pub config: Arc<ConsultConfig>,
    rooms: DashMap<RoomName, Arc<RoomState>>,
    peer_index: DashMap<PeerId, RoomName>,
    agents: DashMap<RoomName, RoomAgentHandle>,
    repo: Arc<SessionRepo>,
    chat: Arc<dyn ChatGateway>,
    vectorstore: Arc<dyn VectorStore>,
    faq_cache: Arc<SemanticCache>,
}

impl Hub {
    pub fn new(
        config: Arc<ConsultConfig>,
        repo: Arc<SessionRepo>,
        chat: Arc<dyn ChatGateway>,
        vectorstore: Arc<dyn VectorStore>,
        faq_cache: Arc<SemanticCache>,
    ) -> Self {
        Self {
            config,
            rooms: DashMap::new(),
            peer_index: DashMap::new(),
            agents: DashMap::new(),
            repo,
            chat,
            vectorstore,
            faq_cache,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub async fn room_names(&self) -> Vec<(String, usize)> {
        let mut out = Vec::with_capacity(self.rooms.len());
        for entry in self.rooms.iter() {
            let peer_count = entry.value().peers.read().await.len();
            out.push((entry.key().as_str().to_string(), peer_count));
        }
        out
    }

    /// Registers a new peer connection in `room`, creating the room (and
    /// its analysis agent, if one doesn't already exist) on first join.
    /// Returns the new peer's id and the roster already present.
    pub async fn join(
        &self,
        room: RoomName,
        nickname: String,
        sender: mpsc::Sender<ServerFrame>,
    ) -> (PeerId, Vec<PeerSummary>) {
        let room_state = self
            .rooms
            .entry(room.clone())
            .or_insert_with(|| Arc::new(RoomState {
                peers: RwLock::new(HashMap::new()),
            }))
            .clone();

        self.ensure_agent(&room).await;

        let peer_id = PeerId::new();
        let mut peers = room_state.peers.write().await;
        let existing: Vec<PeerSummary> = peers
            .iter()
            .map(|(id, h)| PeerSummary {
                peer_id: id.as_str().to_string(),
                nickname: h.nickname.clone(),
            })
            .collect();
        peers.insert(
            peer_id.clone(),
            PeerHandle {
                nickname: nickname.clone(),
                sender,
            },
        );
        drop(peers);

        self.peer_index.insert(peer_id.clone(), room.clone());
        info!(room = %room, peer = %peer_id, "peer joined");

        self.broadcast_to_room(
            &room,
            ServerFrame::PeerJoined {
                peer_id: peer_id.as_str().to_string(),
                nickname,
            },
            Some(&peer_id),
        )
        .await;

        (peer_id, existing)
    }

    /// Removes a peer from its room. If the room is now empty its roster
    /// is dropped (the agent is not — see struct docs).
    pub async fn leave(&self, peer_id: &PeerId) {
        let Some((_, room)) = self.peer_index.remove(peer_id) else {
            return;
        };
        let Some(room_state) = self.rooms.get(&room).map(|r| r.clone()) else {
            return;
        };

        let mut peers = room_state.peers.write().await;
        peers.remove(peer_id);
        let now_empty = peers.is_empty();
        drop(peers);

        if now_empty {
            self.rooms.remove(&room);
        }

        info!(room = %room, peer = %peer_id, "peer left");
        self.broadcast_to_room(
            &room,
            ServerFrame::PeerLeft {
                peer_id: peer_id.as_str().to_string(),
            },
            None,
        )
        .await;
    }

    /// Routes a signaling frame (offer/answer/ice) to one specific peer in
    /// the same room as `from`.
    pub async fn route_to(
        &self,
        from: &PeerId,
        to: &PeerId,
        frame: ServerFrame,
    ) -> Result<(), ConsultError> {
        let room = self
            .peer_index
            .get(from)
            .map(|r| r.clone())
            .ok_or_else(|| ConsultError::NotFound("peer not joined to a room".to_string()))?;
        let room_state = self
            .rooms
            .get(&room)
            .map(|r| r.clone())
            .ok_or_else(|| ConsultError::NotFound(format!("room not found: {}", room)))?;

        let peers = room_state.peers.read().await;
        let target = peers
            .get(to)
            .ok_or_else(|| ConsultError::NotFound(format!("peer not in room: {}", to)))?;
        target
            .sender
            .send(frame)
            .await
            .map_err(|_| ConsultError::Upstream("peer send channel closed".to_string()))
    }

    async fn broadcast_to_room(&self, room: &RoomName, frame: ServerFrame, exclude: Option<&PeerId>) {
        let Some(room_state) = self.rooms.get(room).map(|r| r.clone()) else {
            return;
        };
        let peers = room_state.peers.read().await;
        for (id, handle) in peers.iter() {
            if Some(id) == exclude {
                continue;
            }
            let _ = handle.sender.send(frame.clone()).await;
        }
    }

    pub fn room_for_peer(&self, peer_id: &PeerId) -> Option<RoomName> {
        self.peer_index.get(peer_id).map(|r| r.clone())
    }

    /// Submits a transcript line to the room's analysis agent and fans the
    /// turn id back to the caller; analysis results stream to the room
    /// asynchronously via the forwarding task started in `ensure_agent`.
    pub async fn ingest_transcript(
        &self,
        room: &RoomName,
        speaker_role: SpeakerRole,
        speaker_name: String,
        text: String,
        confidence: Option<f32>,
    ) -> Result<(), ConsultError> {
        let handle = self
            .agents
            .get(room)
            .map(|a| a.clone())
            .ok_or_else(|| ConsultError::NotFound(format!("no agent for room: {}", room)))?;
        handle
            .submit_transcript(speaker_role, speaker_name, text, confidence)
            .await
            .map_err(|e| ConsultError::Overloaded(e.to_string()))?;
        Ok(())
    }

    async fn ensure_agent(&self, room: &RoomName) {
        if self.agents.contains_key(room) {
            return;
        }

        let session_id = SessionId::new();
        if let Err(err) = self.repo.create_session(&session_id, room.as_str()) {
            warn!(error = %err, "failed to create session row");
        }

        let agent = RoomAgent::new(
            session_id,
            room.clone(),
            self.repo.clone(),
            self.chat.clone(),
            self.vectorstore.clone(),
            self.faq_cache.clone(),
            Arc::new(self.config.graph.clone()),
        );
        let (_agent, handle) = agent.spawn(self.config.rooms.mailbox_capacity);

        let mut results_rx = handle.subscribe();
        let room_for_task = room.clone();
        let rooms = self.rooms.clone();
        tokio::spawn(async move {
            while let Ok(result) = results_rx.recv().await {
                let Some(room_state) = rooms.get(&room_for_task).map(|r| r.clone()) else {
                    continue;
                };
                let frame = ServerFrame::AgentResult {
                    kind: result.kind.to_string(),
                    turn_id: result.turn_id.0,
                    payload: serde_json::to_value(&result.payload).unwrap_or(serde_json::Value::Null),
                };
                let peers = room_state.peers.read().await;
                for (_, handle) in peers.iter() {
                    let _ = handle.sender.send(frame.clone()).await;
                }
            }
        });

        self.agents.insert(room.clone(), handle);
    }
}
