//! Test double for [`ChatGateway`] — returns canned responses or injected
//! errors, used by `consult-graph` and `consult-agent` unit tests so they
//! never make a real network call.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;
use crate::gateway::ChatGateway;

pub struct NullChatGateway {
    complete_response: Mutex<Option<Result<String, String>>>,
    embed_response: Vec<f32>,
}

impl NullChatGateway {
    pub fn new(complete_response: impl Into<String>) -> Self {
        Self {
            complete_response: Mutex::new(Some(Ok(complete_response.into()))),
            embed_response: vec![0.0; 8],
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            complete_response: Mutex::new(Some(Err(message.into()))),
            embed_response: vec![0.0; 8],
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embed_response = embedding;
        self
    }
}

#[async_trait]
impl ChatGateway for NullChatGateway {
    async fn complete(
        &self,
        _prompt: &str,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        match self.complete_response.lock().unwrap().clone() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(LlmError::Api {
                status: 500,
                message,
            }),
            None => Ok(String::new()),
        }
    }

    async fn stream(
        &self,
        prompt: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<mpsc::Receiver<String>, LlmError> {
        let text = self.complete(prompt, timeout, cancel).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(text).await;
        Ok(rx)
    }

    async fn embed(
        &self,
        _text: &str,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<Vec<f32>, LlmError> {
        Ok(self.embed_response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_canned_response() {
        let gw = NullChatGateway::new("hello");
        let cancel = CancellationToken::new();
        let out = gw
            .complete("ignored", Duration::from_secs(1), &cancel)
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn failing_double_returns_api_error() {
        let gw = NullChatGateway::failing("boom");
        let cancel = CancellationToken::new();
        let err = gw
            .complete("ignored", Duration::from_secs(1), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api { .. }));
    }
}
