use consult_core::types::ResultKind;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::NodeError;
use crate::node::{err_result, ok_result, with_timeout};
use crate::state::{GraphState, NodePatch};
use crate::types::IntentResult;

pub async fn run(state: &GraphState) -> (Option<IntentResult>, NodePatch) {
    match with_timeout(state, call(state)).await {
        Ok(intent) => {
            let result = ok_result(state, ResultKind::Intent, intent.clone());
            (Some(intent), NodePatch::Result(result))
        }
        Err(err) => {
            warn!(error = %err, "intent node failed");
            (None, NodePatch::Result(err_result(state, ResultKind::Intent, &err)))
        }
    }
}

async fn call(state: &GraphState) -> Result<IntentResult, NodeError> {
    let labels = state.config.intent_labels.join(", ");
    let prompt = format!(
        "{}\n\nCustomer's latest message:\n{}\n\nClassify the customer's intent as exactly one of: {}.\nRespond with only the label.",
        state.snapshot.static_prefix,
        state.latest_customer_text(),
        labels
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

    let normalized = raw.trim().to_lowercase();
    let label = state
        .config
        .intent_labels
        .iter()
        .find(|l| normalized.contains(l.as_str()))
        .cloned()
        .unwrap_or_else(|| "other".to_string());

    Ok(IntentResult {
        label,
        confidence: if normalized.is_empty() { 0.0 } else { 0.8 },
        evidence_spans: vec![state.latest_customer_text()],
    })
}
