use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use consult_core::config::ConsultConfig;
use consult_core::embed::Embedder;
use consult_core::error::ConsultError;
use consult_core::types::{RoomName, SpeakerRole};
use consult_hub::hub::Hub;
use consult_llm::null::NullChatGateway;
use consult_protocol::frames::ServerFrame;
use consult_repo::SessionRepo;
use consult_vectorstore::cache::SemanticCache;
use consult_vectorstore::manager::SqliteVectorStore;
use rusqlite::Connection;
use tokio::sync::mpsc;

struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ConsultError> {
        Ok(vec![1.0, 0.0])
    }
}

fn build_hub() -> Arc<Hub> {
    let repo_conn = Connection::open_in_memory().unwrap();
    consult_repo::db::init_db(&repo_conn).unwrap();
    let repo = Arc::new(SessionRepo::new(repo_conn));

    let embedder: Arc<dyn Embedder> = Arc::new(FixedEmbedder);
    let store_conn = Connection::open_in_memory().unwrap();
    consult_vectorstore::db::init_db(&store_conn).unwrap();
    let store = Arc::new(SqliteVectorStore::new(store_conn, embedder.clone()));
    let cache_conn = Connection::open_in_memory().unwrap();
    consult_vectorstore::db::init_db(&cache_conn).unwrap();
    let faq_cache = Arc::new(SemanticCache::new(cache_conn, embedder, store.clone(), 0.45));

    let chat = Arc::new(NullChatGateway::new("change_plan"));

    Arc::new(Hub::new(
        Arc::new(ConsultConfig::default()),
        repo,
        chat,
        store,
        faq_cache,
    ))
}

fn peer_channel() -> (mpsc::Sender<ServerFrame>, mpsc::Receiver<ServerFrame>) {
    mpsc::channel(32)
}

#[tokio::test]
async fn second_peer_join_is_broadcast_to_first() {
    let hub = build_hub();
    let room = RoomName::from("room-a");

    let (tx1, mut rx1) = peer_channel();
    let (id1, existing1) = hub.join(room.clone(), "alice".to_string(), tx1).await;
    assert!(existing1.is_empty());

    let (tx2, _rx2) = peer_channel();
    let (id2, existing2) = hub.join(room.clone(), "bob".to_string(), tx2).await;
    assert_eq!(existing2.len(), 1);
    assert_eq!(existing2[0].peer_id, id1.as_str());
    assert_ne!(id1.as_str(), id2.as_str());

    let frame = tokio::time::timeout(Duration::from_secs(2), rx1.recv())
        .await
        .unwrap()
        .unwrap();
    match frame {
        ServerFrame::PeerJoined { nickname, .. } => assert_eq!(nickname, "bob"),
        other => panic!("expected peer-joined, got {:?}", other),
    }

    assert_eq!(hub.room_count(), 1);
}

#[tokio::test]
async fn leaving_last_peer_drops_the_room() {
    let hub = build_hub();
    let room = RoomName::from("room-b");
    let (tx, _rx) = peer_channel();
    let (peer_id, _) = hub.join(room.clone(), "solo".to_string(), tx).await;
    assert_eq!(hub.room_count(), 1);

    hub.leave(&peer_id).await;
    assert_eq!(hub.room_count(), 0);
}

#[tokio::test]
async fn route_to_delivers_only_to_the_named_peer() {
    let hub = build_hub();
    let room = RoomName::from("room-c");
    let (tx1, _rx1) = peer_channel();
    let (id1, _) = hub.join(room.clone(), "alice".to_string(), tx1).await;
    let (tx2, mut rx2) = peer_channel();
    let (id2, _) = hub.join(room.clone(), "bob".to_string(), tx2).await;

    hub.route_to(
        &id1,
        &id2,
        ServerFrame::Offer {
            from: id1.as_str().to_string(),
            payload: serde_json::json!({"sdp": "v=0"}),
        },
    )
    .await
    .unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(2), rx2.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(frame, ServerFrame::Offer { .. }));
}

#[tokio::test]
async fn ingest_transcript_without_a_room_fails() {
    let hub = build_hub();
    let room = RoomName::from("no-such-room");
    let err = hub
        .ingest_transcript(&room, SpeakerRole::Customer, "alice".to_string(), "hi".to_string(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn ingest_transcript_streams_agent_results_to_the_room() {
    let hub = build_hub();
    let room = RoomName::from("room-d");
    let (tx, mut rx) = peer_channel();
    let (_peer_id, _) = hub.join(room.clone(), "alice".to_string(), tx).await;

    hub.ingest_transcript(
        &room,
        SpeakerRole::Customer,
        "alice".to_string(),
        "I want to cancel my plan".to_string(),
        None,
    )
    .await
    .unwrap();

    let mut got_result = false;
    for _ in 0..6 {
        let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        if let Ok(Some(ServerFrame::AgentResult { .. })) = frame {
            got_result = true;
            break;
        }
    }
    assert!(got_result, "expected at least one agent-result frame");
}
