//! OpenAI-backed gateway implementing [`LlmClient`].
//!
//! Chat and structured output go through the Chat Completions API; structured
//! calls use the `json_schema` response format. Embeddings use the Embeddings
//! API. A missing API key yields a gateway whose every call returns
//! `Unavailable`, so the core degrades to its documented fallback paths
//! instead of failing at startup.

use std::time::{Duration, Instant};

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    types::embeddings::{CreateEmbeddingRequest, EmbeddingInput},
    Client,
};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::message::{Message, MessageKind};
use crate::stream::MessageChunk;

use super::{CallOptions, Completion, LlmClient, LlmError, OutputSchema, TokenUsage};

/// OpenAI gateway. Stateless; safe for unlimited concurrent calls.
pub struct OpenAiGateway {
    client: Option<Client<OpenAIConfig>>,
    model: String,
    embedding_model: String,
}

impl OpenAiGateway {
    /// Builds a gateway from an optional API key. `None` produces an
    /// unavailable gateway (calls fail with [`LlmError::Unavailable`]).
    pub fn new(
        api_key: Option<String>,
        model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        let client = api_key
            .filter(|k| !k.is_empty())
            .map(|k| Client::with_config(OpenAIConfig::new().with_api_key(k)));
        Self {
            client,
            model: model.into(),
            embedding_model: embedding_model.into(),
        }
    }

    /// Builds a gateway with an explicit config (custom base URL etc.).
    pub fn with_config(
        config: OpenAIConfig,
        model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            client: Some(Client::with_config(config)),
            model: model.into(),
            embedding_model: embedding_model.into(),
        }
    }

    /// Whether a client is configured (used by health reporting).
    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&Client<OpenAIConfig>, LlmError> {
        self.client.as_ref().ok_or(LlmError::Unavailable)
    }

    fn to_request_messages(messages: &[Message]) -> Vec<ChatCompletionRequestMessage> {
        messages
            .iter()
            .map(|m| match m.kind {
                MessageKind::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage::from(m.content.as_str()),
                ),
                MessageKind::Human => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(m.content.as_str()),
                ),
                MessageKind::Ai => {
                    ChatCompletionRequestMessage::Assistant(m.content.as_str().into())
                }
            })
            .collect()
    }

    fn build_args(
        &self,
        messages: &[Message],
        opts: &CallOptions,
    ) -> CreateChatCompletionRequestArgs {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(Self::to_request_messages(messages));
        if let Some(t) = opts.temperature {
            args.temperature(t);
        }
        if let Some(n) = opts.max_tokens {
            args.max_completion_tokens(n);
        }
        args
    }

    /// Applies the call deadline to a future, mapping elapse to `Timeout`.
    async fn with_deadline<T, F>(deadline: Option<Duration>, fut: F) -> Result<T, LlmError>
    where
        F: std::future::Future<Output = Result<T, LlmError>>,
    {
        match deadline {
            Some(d) => tokio::time::timeout(d, fut)
                .await
                .map_err(|_| LlmError::Timeout)?,
            None => fut.await,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiGateway {
    async fn complete(
        &self,
        messages: &[Message],
        opts: &CallOptions,
    ) -> Result<Completion, LlmError> {
        let client = self.client()?.clone();
        let request = self
            .build_args(messages, opts)
            .build()
            .map_err(|e| LlmError::Transport(format!("request build failed: {e}")))?;

        debug!(model = %self.model, message_count = messages.len(), "chat completion");
        let started = Instant::now();
        let response = Self::with_deadline(opts.deadline, async {
            client
                .chat()
                .create(request)
                .await
                .map_err(|e| LlmError::Transport(e.to_string()))
        })
        .await?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Transport("no choices returned".into()))?;
        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            usage,
            latency_ms,
        })
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        opts: &CallOptions,
        chunk_tx: mpsc::Sender<MessageChunk>,
    ) -> Result<Completion, LlmError> {
        let client = self.client()?.clone();
        let mut args = self.build_args(messages, opts);
        args.stream(true);
        let request = args
            .build()
            .map_err(|e| LlmError::Transport(format!("request build failed: {e}")))?;

        debug!(model = %self.model, message_count = messages.len(), "chat completion stream");
        let started = Instant::now();
        let run = async {
            let mut stream = client
                .chat()
                .create_stream(request)
                .await
                .map_err(|e| LlmError::Transport(e.to_string()))?;

            let mut full_content = String::new();
            let mut usage: Option<TokenUsage> = None;
            while let Some(result) = stream.next().await {
                let response = result.map_err(|e| LlmError::Transport(e.to_string()))?;
                if let Some(u) = &response.usage {
                    usage = Some(TokenUsage {
                        prompt_tokens: u.prompt_tokens,
                        completion_tokens: u.completion_tokens,
                        total_tokens: u.total_tokens,
                    });
                }
                for choice in response.choices {
                    if let Some(content) = &choice.delta.content {
                        if !content.is_empty() {
                            full_content.push_str(content);
                            // Receiver may have gone away mid-stream; keep accumulating.
                            let _ = chunk_tx
                                .send(MessageChunk {
                                    content: content.clone(),
                                })
                                .await;
                        }
                    }
                }
            }
            Ok((full_content, usage))
        };
        let (content, usage) = Self::with_deadline(opts.deadline, run).await?;

        Ok(Completion {
            content,
            usage,
            latency_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let client = self.client()?.clone();
        let request = CreateEmbeddingRequest {
            input: EmbeddingInput::String(text.to_string()),
            model: self.embedding_model.clone(),
            ..Default::default()
        };
        let response = client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::Transport("no embedding returned".into()))
    }

    async fn structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
        opts: &CallOptions,
    ) -> Result<serde_json::Value, LlmError> {
        let client = self.client()?.clone();
        let mut args = self.build_args(messages, opts);
        args.response_format(ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                name: schema.name.clone(),
                description: None,
                schema: Some(schema.schema.clone()),
                strict: Some(true),
            },
        });
        let request = args
            .build()
            .map_err(|e| LlmError::Transport(format!("request build failed: {e}")))?;

        debug!(model = %self.model, schema = %schema.name, "structured completion");
        let response = Self::with_deadline(opts.deadline, async {
            client
                .chat()
                .create(request)
                .await
                .map_err(|e| LlmError::Transport(e.to_string()))
        })
        .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::BadStructuredOutput("empty response".into()))?;
        serde_json::from_str(&content).map_err(|e| LlmError::BadStructuredOutput(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CallOptions;

    /// **Scenario**: no API key yields an unavailable gateway; every call fails
    /// with Unavailable instead of panicking.
    #[tokio::test]
    async fn missing_key_is_unavailable() {
        let gateway = OpenAiGateway::new(None, "gpt-4o-mini", "text-embedding-3-small");
        assert!(!gateway.is_configured());

        let messages = [Message::human("hello")];
        let r = gateway.complete(&messages, &CallOptions::new()).await;
        assert!(matches!(r, Err(LlmError::Unavailable)));
        let r = gateway.embed("hello").await;
        assert!(matches!(r, Err(LlmError::Unavailable)));
    }

    /// **Scenario**: a configured gateway against an unreachable base returns a
    /// transport error (no real key needed).
    #[tokio::test]
    async fn unreachable_base_is_transport_error() {
        let config = OpenAIConfig::new()
            .with_api_key("test-key")
            .with_api_base("http://127.0.0.1:1");
        let gateway = OpenAiGateway::with_config(config, "gpt-4o-mini", "text-embedding-3-small");
        let messages = [Message::human("hello")];
        let r = gateway.complete(&messages, &CallOptions::new()).await;
        assert!(matches!(r, Err(LlmError::Transport(_))));
    }

    /// **Scenario**: a tight deadline elapses before the unreachable call and
    /// surfaces Timeout.
    #[tokio::test]
    async fn deadline_maps_to_timeout() {
        let config = OpenAIConfig::new()
            .with_api_key("test-key")
            .with_api_base("http://10.255.255.1:9"); // non-routable, hangs
        let gateway = OpenAiGateway::with_config(config, "gpt-4o-mini", "text-embedding-3-small");
        let messages = [Message::human("hello")];
        let opts = CallOptions::new().with_deadline(Duration::from_millis(50));
        let r = gateway.complete(&messages, &opts).await;
        assert!(
            matches!(r, Err(LlmError::Timeout) | Err(LlmError::Transport(_))),
            "expected timeout (or fast transport error), got {r:?}"
        );
    }
}
