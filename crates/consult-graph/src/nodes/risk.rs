use consult_core::types::ResultKind;

use crate::node::ok_result;
use crate::state::{GraphState, NodePatch};
use crate::types::{RiskLevel, RiskResult, SentimentResult, SentimentTag};

/// Flags escalation risk from keyword hits in the latest turns plus the
/// sentiment branch's read on the customer's mood. Pure local computation
/// — no LLM call, so it never times out and never fails.
pub async fn run(state: &GraphState, sentiment: Option<&SentimentResult>) -> NodePatch {
    let result = compute(state, sentiment);
    NodePatch::Result(ok_result(state, ResultKind::Risk, result))
}

fn compute(state: &GraphState, sentiment: Option<&SentimentResult>) -> RiskResult {
    let text = state.latest_customer_text();
    let hit_keyword = state
        .config
        .risk_keywords
        .iter()
        .find(|kw| text.contains(kw.as_str()));

    let is_negative = sentiment
        .map(|s| s.tag == SentimentTag::Negative && s.arousal > 0.5)
        .unwrap_or(false);

    match (hit_keyword, is_negative) {
        (Some(kw), _) => RiskResult {
            level: RiskLevel::High,
            reason: format!("keyword match: {}", kw),
        },
        (None, true) => RiskResult {
            level: RiskLevel::High,
            reason: "negative, high-arousal sentiment".to_string(),
        },
        (None, false) => RiskResult {
            level: RiskLevel::Low,
            reason: "no risk indicators".to_string(),
        },
    }
}
