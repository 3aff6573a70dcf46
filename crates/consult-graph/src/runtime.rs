use std::sync::Arc;
use std::time::Duration;

use consult_core::types::{AnalysisResult, TurnId};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::node::{err_result, ok_result};
use crate::nodes::{draft_reply, faq_search, intent, rag_policy, risk, sentiment, summarize};
use crate::state::{GraphState, NodePatch};

/// Outcome of one graph run: every branch's published result, plus the
/// rolling summary if the summarize branch produced one (callers fold
/// this into the session's `prior_summary` for the next run).
pub struct GraphOutcome {
    pub turn_id: TurnId,
    pub updated_summary: Option<String>,
    /// New value for the session's `last_summarized_index`, carried back so
    /// the caller can persist how far summarization has advanced. `None`
    /// when the summarize branch didn't run at all (turn already processed,
    /// or the outer timeout fired before it completed).
    pub updated_last_summarized_index: Option<usize>,
    pub results: Vec<AnalysisResult>,
}

/// Runs the four analysis branches for the turn at the tail of
/// `state.snapshot.new_turns`, streaming each result to `patches_tx` as it
/// completes and returning the full set once every branch has finished or
/// the outer timeout has elapsed.
///
/// Idempotent: if this turn id was already processed by this session, the
/// run is skipped and an empty outcome returned — `processed_turn_ids`
/// persists for the session's whole lifetime, not just this invocation.
pub async fn run_graph(
    state: Arc<GraphState>,
    patches_tx: mpsc::Sender<AnalysisResult>,
) -> GraphOutcome {
    let turn_id = state.trigger_turn().turn_id;

    {
        let mut processed = state.processed_turn_ids.lock().await;
        if !processed.insert(turn_id) {
            info!(%turn_id, "turn already analyzed, skipping graph run");
            return GraphOutcome {
                turn_id,
                updated_summary: None,
                updated_last_summarized_index: None,
                results: Vec::new(),
            };
        }
    }

    let outer = Duration::from_millis(state.config.outer_timeout_ms);
    match tokio::time::timeout(outer, run_branches(state.clone(), patches_tx)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(%turn_id, ms = state.config.outer_timeout_ms, "graph run hit outer timeout");
            GraphOutcome {
                turn_id,
                updated_summary: None,
                updated_last_summarized_index: None,
                results: Vec::new(),
            }
        }
    }
}

async fn run_branches(state: Arc<GraphState>, patches_tx: mpsc::Sender<AnalysisResult>) -> GraphOutcome {
    let turn_id = state.trigger_turn().turn_id;

    let summarize_task = tokio::spawn({
        let state = state.clone();
        let tx = patches_tx.clone();
        async move {
            let patch = summarize::run(&state).await;
            let _ = tx.send(patch.result().clone()).await;
            patch
        }
    });

    let intent_branch_task = tokio::spawn({
        let state = state.clone();
        let tx = patches_tx.clone();
        async move { run_intent_branch(&state, tx).await }
    });

    let faq_task = tokio::spawn({
        let state = state.clone();
        let tx = patches_tx.clone();
        async move {
            let patch = faq_search::run(&state).await;
            let _ = tx.send(patch.result().clone()).await;
            patch
        }
    });

    let sentiment_branch_task = tokio::spawn({
        let state = state.clone();
        let tx = patches_tx.clone();
        async move { run_sentiment_branch(&state, tx).await }
    });

    let (summarize_out, intent_out, faq_out, sentiment_out) = tokio::join!(
        summarize_task,
        intent_branch_task,
        faq_task,
        sentiment_branch_task
    );

    let mut results = Vec::with_capacity(7);
    let mut updated_summary = None;
    let mut updated_last_summarized_index = None;

    match summarize_out {
        Ok(NodePatch::Summary {
            summary,
            last_summarized_index,
            result,
        }) => {
            updated_summary = Some(summary);
            updated_last_summarized_index = Some(last_summarized_index);
            results.push(result);
        }
        Ok(NodePatch::Result(result)) => results.push(result),
        Err(_) => results.push(err_result(
            &state,
            consult_core::types::ResultKind::Summary,
            &crate::error::NodeError::Panicked,
        )),
    }

    match faq_out {
        Ok(patch) => results.push(patch.result().clone()),
        Err(_) => results.push(err_result(
            &state,
            consult_core::types::ResultKind::Faq,
            &crate::error::NodeError::Panicked,
        )),
    }

    match intent_out {
        Ok(branch_results) => results.extend(branch_results),
        Err(_) => results.push(err_result(
            &state,
            consult_core::types::ResultKind::Intent,
            &crate::error::NodeError::Panicked,
        )),
    }

    match sentiment_out {
        Ok(branch_results) => results.extend(branch_results),
        Err(_) => results.push(err_result(
            &state,
            consult_core::types::ResultKind::Sentiment,
            &crate::error::NodeError::Panicked,
        )),
    }

    GraphOutcome {
        turn_id,
        updated_summary,
        updated_last_summarized_index,
        results,
    }
}

async fn run_intent_branch(
    state: &Arc<GraphState>,
    tx: mpsc::Sender<AnalysisResult>,
) -> Vec<AnalysisResult> {
    let (maybe_intent, intent_patch) = intent::run(state).await;
    let intent_result = intent_patch.result().clone();
    let _ = tx.send(intent_result.clone()).await;

    let rag_patch = match &maybe_intent {
        Some(label) => rag_policy::run(state, label).await,
        None => NodePatch::Result(ok_result(
            state,
            consult_core::types::ResultKind::Rag,
            crate::types::RagPolicyResult {
                intent_label: "unknown".to_string(),
                policies: Vec::new(),
            },
        )),
    };
    let rag_result = rag_patch.result().clone();
    let _ = tx.send(rag_result.clone()).await;

    let rag_value = match &rag_patch {
        NodePatch::Result(r) => match &r.payload {
            consult_core::types::ResultPayload::Ok(v) => serde_json::from_value(v.clone()).ok(),
            _ => None,
        },
        _ => None,
    };

    let draft_patch = draft_reply::run(
        state,
        None,
        maybe_intent.as_ref(),
        rag_value.as_ref(),
    )
    .await;
    let draft_result = draft_patch.result().clone();
    let _ = tx.send(draft_result.clone()).await;

    vec![intent_result, rag_result, draft_result]
}

async fn run_sentiment_branch(
    state: &Arc<GraphState>,
    tx: mpsc::Sender<AnalysisResult>,
) -> Vec<AnalysisResult> {
    let (maybe_sentiment, sentiment_patch) = sentiment::run(state).await;
    let sentiment_result = sentiment_patch.result().clone();
    let _ = tx.send(sentiment_result.clone()).await;

    let risk_patch = risk::run(state, maybe_sentiment.as_ref()).await;
    let risk_result = risk_patch.result().clone();
    let _ = tx.send(risk_result.clone()).await;

    vec![sentiment_result, risk_result]
}
