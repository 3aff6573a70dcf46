use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use consult_agent::agent::RoomAgent;
use consult_core::config::GraphConfig;
use consult_core::embed::Embedder;
use consult_core::error::ConsultError;
use consult_core::types::{RoomName, SessionId, SpeakerRole};
use consult_llm::null::NullChatGateway;
use consult_repo::SessionRepo;
use consult_vectorstore::cache::SemanticCache;
use consult_vectorstore::manager::SqliteVectorStore;
use rusqlite::Connection;

struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ConsultError> {
        Ok(vec![1.0, 0.0])
    }
}

#[tokio::test]
async fn submitted_turn_is_persisted_and_broadcast() {
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

    let session_id = SessionId::new();
    repo.create_session(&session_id, "room-1").unwrap();

    let agent = RoomAgent::new(
        session_id.clone(),
        RoomName::from("room-1"),
        repo.clone(),
        Arc::new(NullChatGateway::new("change_plan")),
        store,
        faq_cache,
        Arc::new(GraphConfig::default()),
    );
    let (_agent, handle) = agent.spawn(8);
    let mut results = handle.subscribe();

    handle
        .submit_transcript(
            SpeakerRole::Customer,
            "alice".to_string(),
            "I want to cancel my plan".to_string(),
            None,
        )
        .await
        .unwrap();

    let mut seen = 0;
    for _ in 0..7 {
        let got = tokio::time::timeout(Duration::from_secs(5), results.recv()).await;
        if got.is_ok() {
            seen += 1;
        }
    }
    assert_eq!(seen, 7);

    let turns = repo.list_turns(&session_id).unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].text, "I want to cancel my plan");

    let stored_results = repo.list_results(&session_id, None).unwrap();
    assert_eq!(stored_results.len(), 7);
}
