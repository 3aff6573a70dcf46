use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;

/// Narrow interface callers see into the LLM provider: completion,
/// streaming completion, and embedding. No tool calling, no multi-turn
/// conversation bookkeeping — the analysis graph and room agent own
/// prompt assembly, this crate only knows how to talk to the API.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError>;

    async fn stream(
        &self,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<mpsc::Receiver<String>, LlmError>;

    async fn embed(
        &self,
        text: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>, LlmError>;
}
