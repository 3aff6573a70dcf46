use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use consult_core::types::{AnalysisResult, ResultKind, ResultPayload};
use serde::Serialize;

use crate::error::NodeError;
use crate::state::GraphState;

/// Runs `fut` under the configured per-node timeout.
pub async fn with_timeout<F, T>(state: &GraphState, fut: F) -> Result<T, NodeError>
where
    F: Future<Output = Result<T, NodeError>>,
{
    let ms = state.config.node_timeout_ms;
    match tokio::time::timeout(Duration::from_millis(ms), fut).await {
        Ok(inner) => inner,
        Err(_) => Err(NodeError::Timeout { ms }),
    }
}

pub fn ok_result(state: &GraphState, kind: ResultKind, payload: impl Serialize) -> AnalysisResult {
    AnalysisResult {
        session_id: state.snapshot.session_id.clone(),
        turn_id: state.trigger_turn().turn_id,
        kind,
        payload: ResultPayload::Ok(serde_json::to_value(payload).unwrap_or(serde_json::Value::Null)),
        produced_at: Utc::now(),
    }
}

pub fn err_result(state: &GraphState, kind: ResultKind, err: &NodeError) -> AnalysisResult {
    AnalysisResult {
        session_id: state.snapshot.session_id.clone(),
        turn_id: state.trigger_turn().turn_id,
        kind,
        payload: ResultPayload::Err {
            error_code: err.code().to_string(),
        },
        produced_at: Utc::now(),
    }
}
