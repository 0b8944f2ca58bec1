//! Model-serving client: the pipeline's only suspension point.
//!
//! `ModelClient` is the seam the orchestration core depends on. Any failure
//! is reported as absence of a reply, never as a propagated error, so one
//! bad call in a fan-out batch can never take down its siblings.
//! `OpenRouterClient` is the production implementation, speaking the
//! OpenAI-style chat-completions protocol.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ClientError;

/// Default per-call timeout for council stage requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// One message in a model conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// A `system` role message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// A `user` role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A successful reply from a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub content: String,
}

/// Abstraction over the model-serving API.
///
/// Implementations must swallow transport and protocol failures: a failed
/// call is `None`. The pipeline decides what degraded mode looks like.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run one isolated conversation against `model`.
    async fn query(
        &self,
        model: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Option<ModelReply>;
}

/// OpenRouter-compatible chat-completions client.
#[derive(Debug)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl OpenRouterClient {
    /// Default chat-completions endpoint.
    pub const DEFAULT_API_URL: &'static str = "https://openrouter.ai/api/v1/chat/completions";

    pub fn new(api_key: String) -> Self {
        Self::with_api_url(api_key, Self::DEFAULT_API_URL.to_string())
    }

    pub fn with_api_url(api_key: String, api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_url,
        }
    }

    /// Build from `OPENROUTER_API_KEY`, with `OPENROUTER_API_URL` as an
    /// optional endpoint override.
    pub fn from_env() -> Result<Self, ClientError> {
        let api_key = std::env::var("OPENROUTER_API_KEY").map_err(|_| ClientError::MissingApiKey)?;
        let api_url = std::env::var("OPENROUTER_API_URL")
            .unwrap_or_else(|_| Self::DEFAULT_API_URL.to_string());
        Ok(Self::with_api_url(api_key, api_url))
    }

    async fn try_query(
        &self,
        model: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Result<ModelReply, ClientError> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::BadStatus { status, body });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClientError::RequestFailed(e.to_string()))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(ClientError::MissingContent)?;

        Ok(ModelReply {
            content: content.to_string(),
        })
    }
}

#[async_trait]
impl ModelClient for OpenRouterClient {
    async fn query(
        &self,
        model: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Option<ModelReply> {
        match self.try_query(model, messages, timeout).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!(model, error = %e, "model call failed");
                None
            }
        }
    }
}
