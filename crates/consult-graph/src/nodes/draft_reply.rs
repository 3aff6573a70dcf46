use consult_core::types::ResultKind;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::NodeError;
use crate::node::{err_result, ok_result, with_timeout};
use crate::state::{GraphState, NodePatch};
use crate::types::{DraftReplyResult, IntentResult, RagPolicyResult};

/// Drafts candidate agent replies from the rolling summary, the
/// classified intent, and the retrieved policy snippets. Runs last in its
/// branch — if either upstream step failed, drafts from whatever context
/// is available rather than skipping outright.
pub async fn run(
    state: &GraphState,
    summary: Option<&str>,
    intent: Option<&IntentResult>,
    rag: Option<&RagPolicyResult>,
) -> NodePatch {
    match with_timeout(state, call(state, summary, intent, rag)).await {
        Ok(draft) => NodePatch::Result(ok_result(state, ResultKind::Draft, draft)),
        Err(err) => {
            warn!(error = %err, "draft_reply node failed");
            NodePatch::Result(err_result(state, ResultKind::Draft, &err))
        }
    }
}

async fn call(
    state: &GraphState,
    summary: Option<&str>,
    intent: Option<&IntentResult>,
    rag: Option<&RagPolicyResult>,
) -> Result<DraftReplyResult, NodeError> {
    let intent_label = intent.map(|i| i.label.as_str()).unwrap_or("unknown");
    let policies = rag
        .map(|r| {
            r.policies
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    let prompt = format!(
        "{}\n\nSummary so far:\n{}\n\nCustomer intent: {}\n\nRelevant policy:\n{}\n\nDraft two short candidate replies the agent could send next, one per line.",
        state.snapshot.static_prefix,
        summary.unwrap_or(&state.snapshot.prior_summary),
        intent_label,
        policies
    );

    let raw = state
        .chat
        .complete(
            &prompt,
            std::time::Duration::from_millis(state.config.node_timeout_ms),
            &CancellationToken::new(),
        )
        .await
        .map_err(|e| NodeError::Upstream(e.to_string()))?;

    let candidates: Vec<String> = raw
        .lines()
        .map(|l| l.trim().trim_start_matches(['-', '*', '1', '2', '.', ')']).trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    Ok(DraftReplyResult { candidates })
}
