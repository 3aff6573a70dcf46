use consult_core::types::ResultKind;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::NodeError;
use crate::node::{err_result, ok_result, with_timeout};
use crate::state::{GraphState, NodePatch};
use crate::types::{SentimentResult, SentimentTag};

pub async fn run(state: &GraphState) -> (Option<SentimentResult>, NodePatch) {
    match with_timeout(state, call(state)).await {
        Ok(sentiment) => {
            let result = ok_result(state, ResultKind::Sentiment, sentiment);
            (Some(sentiment), NodePatch::Result(result))
        }
        Err(err) => {
            warn!(error = %err, "sentiment node failed");
            (
                None,
                NodePatch::Result(err_result(state, ResultKind::Sentiment, &err)),
            )
        }
    }
}

async fn call(state: &GraphState) -> Result<SentimentResult, NodeError> {
    let prompt = format!(
        "{}\n\nCustomer's latest message:\n{}\n\nRespond with two numbers separated by a space: valence from -1 (very negative) to 1 (very positive), then arousal from 0 (calm) to 1 (agitated). No other text.",
        state.snapshot.static_prefix,
        state.latest_customer_text()
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

    let mut parts = raw.split_whitespace();
    let valence: f32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0.0);
    let arousal: f32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0.0);
    let valence = valence.clamp(-1.0, 1.0);
    let arousal = arousal.clamp(0.0, 1.0);

    let tag = if valence < -0.25 {
        SentimentTag::Negative
    } else if valence > 0.25 {
        SentimentTag::Positive
    } else {
        SentimentTag::Neutral
    };

    Ok(SentimentResult {
        valence,
        arousal,
        tag,
    })
}
