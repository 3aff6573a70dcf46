use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use consult_core::embed::Embedder;
use consult_core::error::ConsultError;

use crate::error::LlmError;
use crate::gateway::ChatGateway;

const API_VERSION: &str = "2023-06-01";

/// Retry schedule for transient transport failures: 250ms, 500ms, 1s, capped
/// at 2s, three attempts total.
const RETRY_BASE_MS: u64 = 250;
const RETRY_MAX_MS: u64 = 2_000;
const RETRY_ATTEMPTS: u32 = 3;

/// Concrete [`ChatGateway`] backed by an HTTP chat-completions API. Holds no
/// mutable state beyond the client handle — every call is independent.
pub struct HttpChatGateway {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    embedding_model: String,
}

impl HttpChatGateway {
    pub fn new(
        api_key: String,
        base_url: String,
        chat_model: String,
        embedding_model: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            chat_model,
            embedding_model,
        }
    }

    async fn send_with_retry(&self, body: serde_json::Value) -> Result<ApiResponse, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        let mut delay_ms = RETRY_BASE_MS;

        for attempt in 1..=RETRY_ATTEMPTS {
            let started = Instant::now();
            let result = self
                .client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if status == 429 {
                        let retry_after_ms = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .map(|secs| secs * 1000)
                            .unwrap_or(5_000);
                        return Err(LlmError::RateLimited { retry_after_ms });
                    }
                    if !resp.status().is_success() {
                        let text = resp.text().await.unwrap_or_default();
                        warn!(status, body = %text, "chat API error");
                        return Err(LlmError::Api {
                            status,
                            message: text,
                        });
                    }
                    info!(elapsed_ms = started.elapsed().as_millis() as u64, "chat request completed");
                    return resp
                        .json()
                        .await
                        .map_err(|e| LlmError::Parse(e.to_string()));
                }
                Err(e) if attempt < RETRY_ATTEMPTS && (e.is_timeout() || e.is_connect()) => {
                    debug!(attempt, error = %e, delay_ms, "transient transport error, retrying");
                    tokio::time::sleep(Duration::from_millis(jittered(delay_ms))).await;
                    delay_ms = (delay_ms * 2).min(RETRY_MAX_MS);
                }
                Err(e) => return Err(LlmError::Http(e)),
            }
        }

        unreachable!("retry loop exited without returning")
    }
}

/// Jitter a millisecond delay by up to 10%, derived from the current
/// timestamp to avoid pulling in a rand dependency for a single call site.
fn jittered(base_ms: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let max_jitter = base_ms / 10;
    if max_jitter == 0 {
        return base_ms;
    }
    base_ms + (nanos as u64 % max_jitter)
}

#[async_trait]
impl ChatGateway for HttpChatGateway {
    async fn complete(
        &self,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.chat_model,
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        });

        tokio::select! {
            result = tokio::time::timeout(timeout, self.send_with_retry(body)) => {
                match result {
                    Ok(Ok(resp)) => Ok(resp.text()),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(LlmError::Timeout { ms: timeout.as_millis() as u64 }),
                }
            }
            _ = cancel.cancelled() => Err(LlmError::Cancelled),
        }
    }

    async fn stream(
        &self,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<mpsc::Receiver<String>, LlmError> {
        // No streaming endpoint wired up yet; fall back to one complete()
        // call and deliver it as a single chunk, matching the default
        // provider behavior of degrading gracefully rather than failing.
        let text = self.complete(prompt, timeout, cancel).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(text).await;
        Ok(rx)
    }

    async fn embed(
        &self,
        text: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>, LlmError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.embedding_model,
            "input": text,
        });

        let request = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send();

        tokio::select! {
            result = tokio::time::timeout(timeout, request) => {
                match result {
                    Ok(Ok(resp)) if resp.status().is_success() => {
                        let parsed: EmbeddingResponse = resp
                            .json()
                            .await
                            .map_err(|e| LlmError::Parse(e.to_string()))?;
                        parsed
                            .data
                            .into_iter()
                            .next()
                            .map(|d| d.embedding)
                            .ok_or_else(|| LlmError::Parse("empty embedding response".to_string()))
                    }
                    Ok(Ok(resp)) => {
                        let status = resp.status().as_u16();
                        let message = resp.text().await.unwrap_or_default();
                        Err(LlmError::Api { status, message })
                    }
                    Ok(Err(e)) => Err(LlmError::Http(e)),
                    Err(_) => Err(LlmError::Timeout { ms: timeout.as_millis() as u64 }),
                }
            }
            _ = cancel.cancelled() => Err(LlmError::Cancelled),
        }
    }
}

#[async_trait]
impl Embedder for HttpChatGateway {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ConsultError> {
        let cancel = CancellationToken::new();
        ChatGateway::embed(self, text, Duration::from_secs(30), &cancel)
            .await
            .map_err(|e| ConsultError::Upstream(e.to_string()))
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

impl ApiResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Unknown => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}
