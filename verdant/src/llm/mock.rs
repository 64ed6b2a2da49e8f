//! Scripted mock gateway for tests.
//!
//! Queued completions and structured payloads pop in order; embeddings are a
//! deterministic function of the input text, so identical strings embed
//! identically (similarity retrieval is exact for round-trips). Configurable
//! failure modes exercise the documented fallback paths without a network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::message::Message;

use super::{CallOptions, Completion, LlmClient, LlmError, OutputSchema};

/// Scripted mock implementing [`LlmClient`].
pub struct MockLlm {
    completions: Mutex<VecDeque<String>>,
    structured: Mutex<VecDeque<serde_json::Value>>,
    /// Fallback content when the completion queue is empty.
    default_completion: String,
    /// When true, structured calls always fail with BadStructuredOutput.
    fail_structured: bool,
    /// When true, every call fails with Unavailable.
    unavailable: bool,
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlm {
    /// Mock with a generic default completion and no scripted outputs.
    pub fn new() -> Self {
        Self {
            completions: Mutex::new(VecDeque::new()),
            structured: Mutex::new(VecDeque::new()),
            default_completion:
                "Here is a grounded next step for your climate career exploration.".to_string(),
            fail_structured: false,
            unavailable: false,
        }
    }

    /// Mock whose every call fails with `Unavailable` (no client configured).
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new()
        }
    }

    /// Queues one completion (builder; pops FIFO).
    pub fn with_completion(self, content: impl Into<String>) -> Self {
        self.completions.lock().unwrap().push_back(content.into());
        self
    }

    /// Sets the fallback content used when the completion queue is empty.
    pub fn with_default_completion(mut self, content: impl Into<String>) -> Self {
        self.default_completion = content.into();
        self
    }

    /// Queues one structured payload (builder; pops FIFO).
    pub fn with_structured(self, value: serde_json::Value) -> Self {
        self.structured.lock().unwrap().push_back(value);
        self
    }

    /// Makes every structured call fail with `BadStructuredOutput`.
    pub fn with_structured_failure(mut self) -> Self {
        self.fail_structured = true;
        self
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(
        &self,
        _messages: &[Message],
        _opts: &CallOptions,
    ) -> Result<Completion, LlmError> {
        if self.unavailable {
            return Err(LlmError::Unavailable);
        }
        let content = self
            .completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_completion.clone());
        Ok(Completion {
            content,
            usage: None,
            latency_ms: 0.1,
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.unavailable {
            return Err(LlmError::Unavailable);
        }
        Ok(deterministic_embedding(text))
    }

    async fn structured(
        &self,
        _messages: &[Message],
        schema: &OutputSchema,
        _opts: &CallOptions,
    ) -> Result<serde_json::Value, LlmError> {
        if self.unavailable {
            return Err(LlmError::Unavailable);
        }
        if self.fail_structured {
            return Err(LlmError::BadStructuredOutput(format!(
                "mock failure for schema {}",
                schema.name
            )));
        }
        self.structured
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| {
                LlmError::BadStructuredOutput(format!("no scripted output for {}", schema.name))
            })
    }
}

/// Small deterministic text embedding: byte histogram over 32 buckets,
/// L2-normalized. Identical strings embed identically.
fn deterministic_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 32];
    for (i, b) in text.bytes().enumerate() {
        v[(b as usize + i) % 32] += 1.0;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: scripted completions pop in order, then the default applies.
    #[tokio::test]
    async fn completions_pop_in_order() {
        let llm = MockLlm::new()
            .with_completion("one")
            .with_completion("two")
            .with_default_completion("fallback");
        let opts = CallOptions::new();
        assert_eq!(llm.complete(&[], &opts).await.unwrap().content, "one");
        assert_eq!(llm.complete(&[], &opts).await.unwrap().content, "two");
        assert_eq!(llm.complete(&[], &opts).await.unwrap().content, "fallback");
    }

    /// **Scenario**: structured queue drains, then errors as BadStructuredOutput.
    #[tokio::test]
    async fn structured_queue_then_error() {
        let llm = MockLlm::new().with_structured(serde_json::json!({"k": 1}));
        let schema = OutputSchema::new("s", serde_json::json!({}));
        let opts = CallOptions::new();
        assert_eq!(
            llm.structured(&[], &schema, &opts).await.unwrap(),
            serde_json::json!({"k": 1})
        );
        assert!(matches!(
            llm.structured(&[], &schema, &opts).await,
            Err(LlmError::BadStructuredOutput(_))
        ));
    }

    /// **Scenario**: unavailable mock fails every operation with Unavailable.
    #[tokio::test]
    async fn unavailable_everywhere() {
        let llm = MockLlm::unavailable();
        let opts = CallOptions::new();
        assert!(matches!(llm.complete(&[], &opts).await, Err(LlmError::Unavailable)));
        assert!(matches!(llm.embed("x").await, Err(LlmError::Unavailable)));
    }

    /// **Scenario**: embeddings are deterministic and unit-length.
    #[tokio::test]
    async fn embeddings_deterministic() {
        let llm = MockLlm::new();
        let a = llm.embed("same text").await.unwrap();
        let b = llm.embed("same text").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
