use consult_core::types::ResultKind;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::NodeError;
use crate::node::{err_result, ok_result, with_timeout};
use crate::state::GraphState;
use crate::state::NodePatch;
use crate::types::SummaryResult;

/// Rolls the prior summary forward over the turns new since the last run.
/// Runs alone in its branch — nothing downstream of it depends on its
/// output within the same invocation, it only feeds the *next* run's
/// `prior_summary`.
pub async fn run(state: &GraphState) -> NodePatch {
    if state.snapshot.new_turns.is_empty() {
        let carried = SummaryResult {
            summary: state.snapshot.prior_summary.clone(),
            customer_issue: String::new(),
            agent_action: String::new(),
        };
        let result = ok_result(state, ResultKind::Summary, carried.clone());
        return NodePatch::Summary {
            summary: carried.summary,
            last_summarized_index: state.snapshot.last_summarized_index,
            result,
        };
    }

    match with_timeout(state, call(state)).await {
        Ok(summary) => {
            let result = ok_result(state, ResultKind::Summary, summary.clone());
            NodePatch::Summary {
                summary: summary.summary,
                last_summarized_index: state.snapshot.last_summarized_index
                    + state.snapshot.new_turns.len(),
                result,
            }
        }
        Err(err) => {
            warn!(error = %err, "summarize node failed");
            NodePatch::Result(err_result(state, ResultKind::Summary, &err))
        }
    }
}

async fn call(state: &GraphState) -> Result<SummaryResult, NodeError> {
    let transcript = render_new_turns(state);
    let prompt = format!(
        "{}\n\nPrior summary:\n{}\n\nNew turns:\n{}\n\nRoll the summary forward over the new turns. \
         Respond with ONLY a strict JSON object of the form \
         {{\"summary\": \"<updated one-paragraph summary>\", \"customer_issue\": \"<what the customer wants resolved>\", \"agent_action\": \"<what the agent has done or should do next>\"}}.",
        state.snapshot.static_prefix, state.snapshot.prior_summary, transcript
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

    Ok(parse_summary(&raw))
}

/// Pulls the JSON object out of the completion (models sometimes wrap it in
/// prose or a code fence) and parses it into `SummaryResult`. Falls back to
/// treating the whole completion as the summary text if parsing fails.
fn parse_summary(raw: &str) -> SummaryResult {
    let trimmed = raw.trim();
    let json_str = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(s), Some(e)) if e >= s => &trimmed[s..=e],
        _ => trimmed,
    };

    match serde_json::from_str::<SummaryResult>(json_str) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, raw = %json_str, "summarize: JSON parse failed, falling back to raw text");
            SummaryResult {
                summary: trimmed.to_string(),
                customer_issue: String::new(),
                agent_action: String::new(),
            }
        }
    }
}

fn render_new_turns(state: &GraphState) -> String {
    state
        .snapshot
        .new_turns
        .iter()
        .map(|t| format!("[{}] {}: {}", t.turn_id, t.speaker_role, t.text))
        .collect::<Vec<_>>()
        .join("\n")
}
