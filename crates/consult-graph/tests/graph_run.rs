use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use consult_core::config::GraphConfig;
use consult_core::embed::Embedder;
use consult_core::error::ConsultError;
use consult_core::types::{RoomName, SessionId, SpeakerRole, TranscriptTurn, TurnId};
use consult_graph::nodes::summarize;
use consult_graph::state::{GraphState, NodePatch, SessionSnapshot};
use consult_graph::{run_graph, GraphOutcome};
use consult_llm::null::NullChatGateway;
use consult_vectorstore::cache::SemanticCache;
use consult_vectorstore::manager::SqliteVectorStore;
use rusqlite::Connection;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ConsultError> {
        Ok(vec![1.0, 0.0, 0.0])
    }
}

fn turn(id: u64, role: SpeakerRole, text: &str) -> TranscriptTurn {
    TranscriptTurn {
        turn_id: TurnId(id),
        speaker_role: role,
        speaker_name: "someone".to_string(),
        text: text.to_string(),
        timestamp: Utc::now(),
        confidence: None,
    }
}

fn build_state_with_text(text: &str) -> Arc<GraphState> {
    let embedder: Arc<dyn Embedder> = Arc::new(FixedEmbedder);

    let store_conn = Connection::open_in_memory().unwrap();
    consult_vectorstore::db::init_db(&store_conn).unwrap();
    let store = Arc::new(SqliteVectorStore::new(store_conn, embedder.clone()));

    let cache_conn = Connection::open_in_memory().unwrap();
    consult_vectorstore::db::init_db(&cache_conn).unwrap();
    let faq_cache = Arc::new(SemanticCache::new(cache_conn, embedder, store.clone(), 0.45));

    let new_turns = vec![turn(1, SpeakerRole::Customer, text)];
    let snapshot = SessionSnapshot {
        session_id: SessionId::new(),
        room: RoomName::from("room-1"),
        static_prefix: "You are a consultation assistant.".to_string(),
        prior_summary: String::new(),
        history: new_turns.clone(),
        new_turns,
        last_summarized_index: 0,
    };

    Arc::new(GraphState {
        snapshot: Arc::new(snapshot),
        chat: Arc::new(NullChatGateway::new("change_plan")),
        vectorstore: store,
        faq_cache,
        config: Arc::new(GraphConfig::default()),
        processed_turn_ids: Arc::new(AsyncMutex::new(HashSet::new())),
    })
}

fn build_state() -> Arc<GraphState> {
    build_state_with_text("I want to cancel, this is unacceptable")
}

/// A session already fully summarized: `history` has one turn, but
/// `new_turns` is empty and `last_summarized_index` already covers it.
fn build_state_no_new_turns() -> Arc<GraphState> {
    let embedder: Arc<dyn Embedder> = Arc::new(FixedEmbedder);

    let store_conn = Connection::open_in_memory().unwrap();
    consult_vectorstore::db::init_db(&store_conn).unwrap();
    let store = Arc::new(SqliteVectorStore::new(store_conn, embedder.clone()));

    let cache_conn = Connection::open_in_memory().unwrap();
    consult_vectorstore::db::init_db(&cache_conn).unwrap();
    let faq_cache = Arc::new(SemanticCache::new(cache_conn, embedder, store.clone(), 0.45));

    let history = vec![turn(1, SpeakerRole::Customer, "already summarized")];
    let snapshot = SessionSnapshot {
        session_id: SessionId::new(),
        room: RoomName::from("room-1"),
        static_prefix: "You are a consultation assistant.".to_string(),
        prior_summary: "customer wants a refund".to_string(),
        history: history.clone(),
        new_turns: Vec::new(),
        last_summarized_index: history.len(),
    };

    Arc::new(GraphState {
        snapshot: Arc::new(snapshot),
        chat: Arc::new(NullChatGateway::failing("summarize must not call chat when there are no new turns")),
        vectorstore: store,
        faq_cache,
        config: Arc::new(GraphConfig::default()),
        processed_turn_ids: Arc::new(AsyncMutex::new(HashSet::new())),
    })
}

#[tokio::test]
async fn run_graph_produces_all_seven_results() {
    let state = build_state();
    let (tx, mut rx) = mpsc::channel(32);

    let outcome: GraphOutcome = run_graph(state, tx).await;

    assert_eq!(outcome.results.len(), 7);
    assert!(outcome.updated_summary.is_some());
    assert_eq!(outcome.updated_last_summarized_index, Some(1));

    let mut streamed = 0;
    while rx.try_recv().is_ok() {
        streamed += 1;
    }
    assert_eq!(streamed, 7);
}

#[tokio::test]
async fn run_graph_skips_chat_call_when_no_new_turns() {
    let state = build_state_no_new_turns();
    let (tx, _rx) = mpsc::channel(32);

    let outcome = run_graph(state, tx).await;

    // last_summarized_index is carried through unchanged — nothing new to fold in.
    assert_eq!(outcome.updated_last_summarized_index, Some(1));
    let summary = outcome
        .results
        .iter()
        .find(|r| r.kind == consult_core::types::ResultKind::Summary)
        .unwrap();
    match &summary.payload {
        consult_core::types::ResultPayload::Ok(value) => {
            assert_eq!(value["summary"], "customer wants a refund");
        }
        _ => panic!("expected ok summary payload"),
    }
}

#[tokio::test]
async fn run_graph_flags_high_risk_on_keyword_hit() {
    let state = build_state_with_text("환불 해주세요, 더 이상 못 참겠어요");
    let (tx, _rx) = mpsc::channel(32);

    let outcome = run_graph(state, tx).await;
    let risk = outcome
        .results
        .iter()
        .find(|r| r.kind == consult_core::types::ResultKind::Risk)
        .unwrap();

    match &risk.payload {
        consult_core::types::ResultPayload::Ok(value) => {
            assert_eq!(value["level"], "high");
        }
        _ => panic!("expected ok risk payload"),
    }
}

#[tokio::test]
async fn run_graph_skips_already_processed_turn() {
    let state = build_state();
    state
        .processed_turn_ids
        .lock()
        .await
        .insert(TurnId(1));

    let (tx, _rx) = mpsc::channel(32);
    let outcome = run_graph(state, tx).await;

    assert!(outcome.results.is_empty());
    assert!(outcome.updated_summary.is_none());
}

#[tokio::test]
async fn summarize_advances_last_summarized_index_incrementally() {
    let embedder: Arc<dyn Embedder> = Arc::new(FixedEmbedder);
    let store_conn = Connection::open_in_memory().unwrap();
    consult_vectorstore::db::init_db(&store_conn).unwrap();
    let store = Arc::new(SqliteVectorStore::new(store_conn, embedder.clone()));
    let cache_conn = Connection::open_in_memory().unwrap();
    consult_vectorstore::db::init_db(&cache_conn).unwrap();
    let faq_cache = Arc::new(SemanticCache::new(cache_conn, embedder, store.clone(), 0.45));
    let config = Arc::new(GraphConfig::default());
    let processed_turn_ids = Arc::new(AsyncMutex::new(HashSet::new()));

    let first_turn = turn(1, SpeakerRole::Customer, "my order never arrived");
    let chat = Arc::new(NullChatGateway::new(
        r#"{"summary": "customer's order never arrived", "customer_issue": "missing order", "agent_action": "opened a trace ticket"}"#,
    ));
    let state = GraphState {
        snapshot: Arc::new(SessionSnapshot {
            session_id: SessionId::new(),
            room: RoomName::from("room-1"),
            static_prefix: "You are a consultation assistant.".to_string(),
            prior_summary: String::new(),
            history: vec![first_turn.clone()],
            new_turns: vec![first_turn.clone()],
            last_summarized_index: 0,
        }),
        chat,
        vectorstore: store.clone(),
        faq_cache: faq_cache.clone(),
        config: config.clone(),
        processed_turn_ids: processed_turn_ids.clone(),
    };

    let patch = summarize::run(&state).await;
    let (summary_after_first, index_after_first) = match patch {
        NodePatch::Summary {
            summary,
            last_summarized_index,
            ..
        } => (summary, last_summarized_index),
        NodePatch::Result(_) => panic!("expected a summary patch"),
    };
    assert_eq!(index_after_first, 1);
    assert_eq!(summary_after_first, "customer's order never arrived");

    let second_turn = turn(2, SpeakerRole::Customer, "can you refund the shipping too?");
    let chat = Arc::new(NullChatGateway::new(
        r#"{"summary": "customer's order never arrived and now wants shipping refunded", "customer_issue": "missing order, wants shipping refunded", "agent_action": "escalated to billing"}"#,
    ));
    let state = GraphState {
        snapshot: Arc::new(SessionSnapshot {
            session_id: state.snapshot.session_id.clone(),
            room: state.snapshot.room.clone(),
            static_prefix: state.snapshot.static_prefix.clone(),
            prior_summary: summary_after_first,
            history: vec![first_turn, second_turn.clone()],
            new_turns: vec![second_turn],
            last_summarized_index: index_after_first,
        }),
        chat,
        vectorstore: store,
        faq_cache,
        config,
        processed_turn_ids,
    };

    let patch = summarize::run(&state).await;
    match patch {
        NodePatch::Summary {
            last_summarized_index,
            result,
            ..
        } => {
            assert_eq!(last_summarized_index, 2);
            match &result.payload {
                consult_core::types::ResultPayload::Ok(value) => {
                    assert_eq!(value["customer_issue"], "missing order, wants shipping refunded");
                }
                _ => panic!("expected ok summary payload"),
            }
        }
        NodePatch::Result(_) => panic!("expected a summary patch"),
    }
}
