use async_trait::async_trait;

use crate::error::ConsultError;

/// Narrow embedding seam shared by the vector store (needs to embed queries)
/// and the chat model gateway (the thing that actually knows how to produce
/// one). Kept in `consult-core` rather than `consult-llm` so the vector
/// store crate never has to depend on the LLM crate just to turn text into
/// a vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ConsultError>;
}
