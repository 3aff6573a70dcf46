use consult_core::types::ResultKind;
use tracing::warn;

use crate::error::NodeError;
use crate::node::{err_result, ok_result, with_timeout};
use crate::state::{GraphState, NodePatch};
use crate::types::{FaqMatch, FaqResult};

const FAQ_COLLECTION: &str = "faq";
const FAQ_CATEGORY: &str = "faq";

/// Looks up FAQ answers for the customer's latest message through the
/// semantic cache — repeated questions across sessions (a common support
/// pattern) resolve without hitting the embedding API or re-scanning the
/// collection.
pub async fn run(state: &GraphState) -> NodePatch {
    match with_timeout(state, call(state)).await {
        Ok(faq) => NodePatch::Result(ok_result(state, ResultKind::Faq, faq)),
        Err(err) => {
            warn!(error = %err, "faq_search node failed");
            NodePatch::Result(err_result(state, ResultKind::Faq, &err))
        }
    }
}

async fn call(state: &GraphState) -> Result<FaqResult, NodeError> {
    let query = state.latest_customer_text();
    let lookup = state
        .faq_cache
        .lookup_or_search(FAQ_COLLECTION, FAQ_CATEGORY, &query, state.config.rag_top_n)
        .await
        .map_err(|e| NodeError::Upstream(e.to_string()))?;

    Ok(FaqResult {
        matches: lookup
            .documents
            .into_iter()
            .map(|d| FaqMatch {
                doc_id: d.id,
                text: d.text,
            })
            .collect(),
        cache_hit: lookup.cache_hit,
    })
}
