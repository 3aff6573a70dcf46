use consult_core::types::ResultKind;
use tracing::warn;

use crate::error::NodeError;
use crate::node::{err_result, ok_result, with_timeout};
use crate::state::{GraphState, NodePatch};
use crate::types::{IntentResult, PolicySnippet, RagPolicyResult};

const POLICY_COLLECTION: &str = "policies";

/// Retrieves the policy snippets relevant to the customer's classified
/// intent. Skipped (not run) by the runtime when intent classification
/// itself failed — there is nothing to retrieve for.
pub async fn run(state: &GraphState, intent: &IntentResult) -> NodePatch {
    match with_timeout(state, call(state, intent)).await {
        Ok(rag) => NodePatch::Result(ok_result(state, ResultKind::Rag, rag)),
        Err(err) => {
            warn!(error = %err, "rag_policy node failed");
            NodePatch::Result(err_result(state, ResultKind::Rag, &err))
        }
    }
}

async fn call(state: &GraphState, intent: &IntentResult) -> Result<RagPolicyResult, NodeError> {
    let query = format!("{}: {}", intent.label, state.latest_customer_text());
    let docs = state
        .vectorstore
        .similarity_search(POLICY_COLLECTION, &query, state.config.rag_top_n, None)
        .await
        .map_err(|e| NodeError::Upstream(e.to_string()))?;

    Ok(RagPolicyResult {
        intent_label: intent.label.clone(),
        policies: docs
            .into_iter()
            .map(|d| PolicySnippet {
                doc_id: d.id,
                text: d.text,
            })
            .collect(),
    })
}
