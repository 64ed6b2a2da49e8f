//! LLM gateway: uniform chat / embedding / structured-output calls.
//!
//! One [`LlmClient`] trait for every call-site in the core. Each call carries
//! a deadline through [`CallOptions`]; failures map onto the five kinds of
//! [`LlmError`]. The gateway is internally stateless and safe for unlimited
//! concurrent calls; it serializes nothing.

mod mock;
mod openai;

pub use mock::MockLlm;
pub use openai::OpenAiGateway;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::message::Message;
use crate::stream::MessageChunk;

/// Gateway failure kinds.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// No client configured (missing API key).
    #[error("llm unavailable: no client configured")]
    Unavailable,
    /// Deadline exceeded.
    #[error("llm call timed out")]
    Timeout,
    /// Network or API error.
    #[error("llm transport error: {0}")]
    Transport(String),
    /// Output does not conform to the requested schema.
    #[error("llm structured output did not match schema: {0}")]
    BadStructuredOutput(String),
    /// Cancelled at the transport boundary.
    #[error("llm call cancelled")]
    Cancelled,
}

/// Token accounting for one completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One chat completion result.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub usage: Option<TokenUsage>,
    pub latency_ms: f64,
}

/// Per-call options; the deadline comes from the transport budget.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub deadline: Option<Duration>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// JSON schema for a structured-output call.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    /// Schema name passed to the provider.
    pub name: String,
    /// JSON Schema object the response must conform to.
    pub schema: serde_json::Value,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Uniform LLM operations consumed by agents, workflows, and reflection.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Chat completion: messages in, text + token counts + latency out.
    async fn complete(&self, messages: &[Message], opts: &CallOptions)
        -> Result<Completion, LlmError>;

    /// Streaming chat completion: chunks are sent through `chunk_tx` as they
    /// arrive; the returned completion carries the full text and usage.
    async fn complete_stream(
        &self,
        messages: &[Message],
        opts: &CallOptions,
        chunk_tx: mpsc::Sender<MessageChunk>,
    ) -> Result<Completion, LlmError> {
        // Default: one non-streaming call surfaced as a single chunk.
        let completion = self.complete(messages, opts).await?;
        if !completion.content.is_empty() {
            let _ = chunk_tx
                .send(MessageChunk {
                    content: completion.content.clone(),
                })
                .await;
        }
        Ok(completion)
    }

    /// Text embedding for memory retrieval.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    /// Structured output: the returned value conforms to `schema` or the call
    /// fails with `BadStructuredOutput`.
    async fn structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
        opts: &CallOptions,
    ) -> Result<serde_json::Value, LlmError>;
}

/// Deserializes a structured-output value into `T`, mapping serde failures to
/// `BadStructuredOutput` so callers keep one error path.
pub fn parse_structured<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, LlmError> {
    serde_json::from_value(value).map_err(|e| LlmError::BadStructuredOutput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: parse_structured maps schema drift to BadStructuredOutput.
    #[test]
    fn parse_structured_maps_errors() {
        #[derive(serde::Deserialize)]
        struct Expected {
            #[allow(dead_code)]
            score: f32,
        }
        let ok: Result<Expected, _> = parse_structured(serde_json::json!({"score": 0.9}));
        assert!(ok.is_ok());
        let bad: Result<Expected, _> = parse_structured(serde_json::json!({"score": "high"}));
        assert!(matches!(bad, Err(LlmError::BadStructuredOutput(_))));
    }

    /// **Scenario**: CallOptions builder sets deadline, temperature, max tokens.
    #[test]
    fn call_options_builder() {
        let opts = CallOptions::new()
            .with_deadline(Duration::from_secs(3))
            .with_temperature(0.1)
            .with_max_tokens(256);
        assert_eq!(opts.deadline, Some(Duration::from_secs(3)));
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(256));
    }
}
