//! # task-providers — the LLM provider boundary
//!
//! This crate defines the interface the core consumes from LLM backends. No
//! concrete provider ships here — wiring up Anthropic/OpenAI/Ollama clients
//! is an embedder concern, kept outside this crate's `Provider` trait
//! definition.
//!
//! `Provider` is `#[async_trait]` and object-safe: the router and planner
//! need to hold a live `Arc<dyn Provider>` chosen at runtime per
//! (operation, tier) pair, which a generic `P: Provider` parameter cannot
//! express.

#![deny(missing_docs)]

use async_trait::async_trait;
use futures::stream::BoxStream;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A coarse model-size label used by the router and budget envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Small/fast/cheap model.
    Slm,
    /// Large/capable/expensive model.
    Llm,
}

/// One message in a chat-style request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMessage {
    /// Who sent this message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

/// Chat roles accepted by `ModelRequest.messages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user.
    User,
    /// The model's own prior turn.
    Assistant,
    /// System/developer instructions.
    System,
    /// A tool's result being fed back to the model.
    Tool,
}

/// Requested response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free-form text.
    Text,
    /// The model must return a single JSON value.
    Json,
}

/// A request to a `Provider`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Model identifier (provider-specific).
    pub model: String,
    /// Provider name, e.g. `"anthropic"`, `"openai"`, `"ollama"`.
    pub provider: String,
    /// The tier this request is routed at.
    pub tier: Tier,
    /// System prompt.
    pub system: String,
    /// Conversation so far.
    pub messages: Vec<RequestMessage>,
    /// Requested response shape.
    pub response_format: ResponseFormat,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Token accounting for one completed call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens consumed.
    pub prompt_tokens: u64,
    /// Completion tokens produced.
    pub completion_tokens: u64,
    /// `prompt_tokens + completion_tokens`.
    pub total_tokens: u64,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model completed its response normally.
    Stop,
    /// The response was truncated at a token limit.
    Length,
    /// The provider's own content filter stopped generation.
    ContentFilter,
}

/// A complete, non-streaming response from a `Provider`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Generated text.
    pub content: String,
    /// Model actually used (may differ from the request on provider-side fallback).
    pub model: String,
    /// Provider that served the request.
    pub provider: String,
    /// Tier actually used.
    pub tier: Tier,
    /// Token accounting.
    pub token_usage: TokenUsage,
    /// Wall-clock latency of the call, in milliseconds.
    pub latency_ms: u64,
    /// Estimated cost in USD.
    pub cost_usd: Decimal,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
}

/// One chunk of a streamed response. `done = true` appears exactly once, as
/// the last chunk, and is the only chunk carrying `token_usage`/`finish_reason`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponseChunk {
    /// Incremental text for this chunk (empty on the final chunk).
    pub content: String,
    /// Whether this is the final chunk of the stream.
    pub done: bool,
    /// Populated only when `done`.
    pub token_usage: Option<TokenUsage>,
    /// Populated only when `done`.
    pub finish_reason: Option<FinishReason>,
}

/// Errors a `Provider` call can fail with.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The HTTP/network request itself failed.
    #[error("request failed: {0}")]
    RequestFailed(String),
    /// The provider rate-limited this request.
    #[error("rate limited")]
    RateLimited,
    /// Authentication or authorization failed.
    #[error("auth failed: {0}")]
    AuthFailed(String),
    /// The provider's response could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether retrying this exact request might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::RateLimited | ProviderError::RequestFailed(_))
    }
}

/// A stream of response chunks from `Provider::chat_stream`.
pub type ChatStream = BoxStream<'static, Result<ModelResponseChunk, ProviderError>>;

/// LLM provider interface. Each concrete backend (Anthropic, OpenAI, Ollama,
/// or a test double) implements this trait and is registered with the
/// embedder's provider table under its `provider` name.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send a non-streaming chat request.
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError>;

    /// Send a streaming chat request. Default implementation wraps `chat`
    /// as a single-chunk stream; real backends override this with their
    /// native streaming transport.
    async fn chat_stream(&self, request: ModelRequest) -> Result<ChatStream, ProviderError> {
        let response = self.chat(request).await?;
        let chunk = ModelResponseChunk {
            content: response.content,
            done: true,
            token_usage: Some(response.token_usage),
            finish_reason: Some(response.finish_reason),
        };
        Ok(Box::pin(futures::stream::once(async move { Ok(chunk) })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
            Ok(ModelResponse {
                content: request.messages.last().map(|m| m.content.clone()).unwrap_or_default(),
                model: request.model,
                provider: request.provider,
                tier: request.tier,
                token_usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
                latency_ms: 1,
                cost_usd: Decimal::ZERO,
                finish_reason: FinishReason::Stop,
            })
        }
    }

    fn sample_request() -> ModelRequest {
        ModelRequest {
            model: "test-model".to_string(),
            provider: "test".to_string(),
            tier: Tier::Slm,
            system: String::new(),
            messages: vec![RequestMessage { role: Role::User, content: "hello".to_string() }],
            response_format: ResponseFormat::Text,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn default_chat_stream_yields_one_done_chunk() {
        use futures::StreamExt;
        let provider = EchoProvider;
        let mut stream = provider.chat_stream(sample_request()).await.unwrap();
        let chunk = stream.next().await.unwrap().unwrap();
        assert!(chunk.done);
        assert_eq!(chunk.content, "hello");
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn provider_error_retryable() {
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(!ProviderError::AuthFailed("bad key".to_string()).is_retryable());
    }
}
