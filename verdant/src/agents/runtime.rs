//! Shared specialist runtime: the uniform invocation pipeline behind every
//! agent.
//!
//! Per call: validate → build context → classify intent (LLM structured
//! output, conservative fallback) → select a templated response → score
//! confidence (second structured call, intent adjustment, clamped) → derive
//! next actions from the intent table → record the episode and fire
//! reflection → return the response with measured processing time.
//!
//! Classification is LLM-driven; the per-profile fallback intent is used only
//! when the structured call fails, and the response records
//! `classification_method = "fallback"` when that happens.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::error::CoreError;
use crate::llm::{parse_structured, CallOptions, LlmClient, OutputSchema};
use crate::memory::{AgentMemory, Episode};
use crate::message::Message;
use crate::prompts::PromptRegistry;
use crate::reflection::ReflectionEngine;
use crate::state::AssessmentMethod;

use super::types::{AgentCapabilities, AgentContext, AgentResponse};
use super::SpecialistKind;

/// One classifiable intent with its response plumbing.
#[derive(Debug, Clone, Copy)]
pub struct IntentSpec {
    pub name: &'static str,
    /// Shown to the classifier so the LLM picks among described options.
    pub description: &'static str,
    /// Additive adjustment applied after confidence scoring, then clamped.
    pub confidence_adjustment: f32,
    pub next_actions: &'static [&'static str],
    pub tools: &'static [&'static str],
}

/// Static per-specialist configuration consumed by the shared runtime.
#[derive(Debug, Clone, Copy)]
pub struct SpecialistProfile {
    pub kind: SpecialistKind,
    pub domains: &'static [&'static str],
    pub intents: &'static [IntentSpec],
    /// Conservative default when classification fails.
    pub fallback_intent: &'static str,
    pub sources: &'static [&'static str],
}

impl SpecialistProfile {
    pub fn intent(&self, name: &str) -> Option<&IntentSpec> {
        self.intents.iter().find(|i| i.name == name)
    }

    fn fallback(&self) -> &IntentSpec {
        self.intent(self.fallback_intent)
            .unwrap_or(&self.intents[0])
    }
}

#[derive(Debug, Deserialize)]
struct IntentClassification {
    intent: String,
    confidence: f32,
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct ConfidenceScore {
    confidence: f32,
}

/// Outcome of the classification step.
struct ClassifiedIntent {
    intent: String,
    confidence: f32,
    method: AssessmentMethod,
}

/// The shared pipeline. Concrete agents wrap this (directly for most
/// specialists; alex and pendo add their own stages on top).
pub struct SpecialistRuntime {
    profile: SpecialistProfile,
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptRegistry>,
    memory: Arc<AgentMemory>,
    reflection: Arc<ReflectionEngine>,
}

impl SpecialistRuntime {
    pub fn new(
        profile: SpecialistProfile,
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptRegistry>,
    ) -> Self {
        let agent_id = profile.kind.as_str();
        Self {
            profile,
            memory: Arc::new(AgentMemory::with_embedder(agent_id, llm.clone())),
            reflection: Arc::new(ReflectionEngine::new(agent_id, llm.clone())),
            llm,
            prompts,
        }
    }

    pub fn profile(&self) -> &SpecialistProfile {
        &self.profile
    }

    pub fn memory(&self) -> &Arc<AgentMemory> {
        &self.memory
    }

    pub fn reflection(&self) -> &Arc<ReflectionEngine> {
        &self.reflection
    }

    pub fn capabilities(&self) -> AgentCapabilities {
        AgentCapabilities {
            kind: self.profile.kind,
            specialist_type: self.profile.kind.specialist_type(),
            domains: self.profile.domains.iter().map(|s| s.to_string()).collect(),
            intents: self.profile.intents.iter().map(|i| i.name.to_string()).collect(),
            tools: self
                .profile
                .intents
                .iter()
                .flat_map(|i| i.tools.iter().map(|t| t.to_string()))
                .collect(),
        }
    }

    /// Validates inputs and runs the pipeline, measuring processing time and
    /// folding any hard failure into a `success=false` response.
    pub async fn handle(
        &self,
        message: &str,
        user_id: &str,
        conversation_id: &str,
        session_data: Option<BTreeMap<String, serde_json::Value>>,
        user_profile: Option<BTreeMap<String, serde_json::Value>>,
    ) -> AgentResponse {
        let started = Instant::now();
        let result = self
            .run_pipeline(message, user_id, conversation_id, session_data, user_profile)
            .await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(mut response) => {
                response.processing_time_ms = Some(elapsed_ms);
                response
            }
            Err(e) => {
                tracing::error!(
                    specialist = %self.profile.kind,
                    user_id,
                    conversation_id,
                    error = %e,
                    "agent interaction failed"
                );
                let mut response = AgentResponse::failure(self.profile.kind, e.to_string());
                response.processing_time_ms = Some(elapsed_ms);
                response
            }
        }
    }

    async fn run_pipeline(
        &self,
        message: &str,
        user_id: &str,
        conversation_id: &str,
        session_data: Option<BTreeMap<String, serde_json::Value>>,
        user_profile: Option<BTreeMap<String, serde_json::Value>>,
    ) -> Result<AgentResponse, CoreError> {
        if message.trim().is_empty() {
            return Err(CoreError::InvalidInput("message cannot be empty".into()));
        }
        if user_id.trim().is_empty() || conversation_id.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "user_id and conversation_id are required".into(),
            ));
        }

        let mut context = AgentContext::new(user_id, conversation_id);
        context.session_data = session_data.unwrap_or_default();
        context.user_profile = user_profile;
        context.tools_available = self
            .profile
            .intents
            .iter()
            .flat_map(|i| i.tools.iter().map(|t| t.to_string()))
            .collect();

        let response = self.respond(message, &context).await;

        // Episode + reflection are observability, not the response path:
        // record best-effort and fire reflection without awaiting it.
        self.memory
            .store_episode(
                Episode::new(format!("user: {message}\nagent: {}", response.content))
                    .with_attribute("intent", serde_json::json!(response.metadata.get("intent")))
                    .with_attribute("conversation_id", serde_json::json!(conversation_id)),
            )
            .await;
        if response.success {
            let reflection = self.reflection.clone();
            let content = response.content.clone();
            tokio::spawn(async move {
                let _ = reflection.reflect(&content).await;
            });
        }

        Ok(response)
    }

    /// The classify → template → score → actions stages, reusable by wrapper
    /// agents that build their own context.
    pub async fn respond(&self, message: &str, context: &AgentContext) -> AgentResponse {
        let classified = self.classify(message).await;
        let spec = self
            .profile
            .intent(&classified.intent)
            .unwrap_or_else(|| self.profile.fallback());

        let content = self.render_template(spec.name, message);
        let confidence = self
            .score_confidence(message, spec, classified.confidence)
            .await;

        let mut metadata = BTreeMap::new();
        metadata.insert("intent".to_string(), serde_json::json!(spec.name));
        metadata.insert(
            "classification_method".to_string(),
            serde_json::json!(match classified.method {
                AssessmentMethod::LlmReasoning => "llm_reasoning",
                AssessmentMethod::Fallback => "fallback",
            }),
        );
        if !context.metadata.is_empty() {
            metadata.insert(
                "context".to_string(),
                serde_json::json!(context.metadata.clone()),
            );
        }

        AgentResponse {
            content,
            specialist_type: self.profile.kind.specialist_type().to_string(),
            confidence_score: confidence,
            tools_used: spec.tools.iter().map(|t| t.to_string()).collect(),
            next_actions: spec.next_actions.iter().map(|a| a.to_string()).collect(),
            sources: self.profile.sources.iter().map(|s| s.to_string()).collect(),
            metadata,
            success: true,
            error_message: None,
            processing_time_ms: None,
        }
    }

    async fn classify(&self, message: &str) -> ClassifiedIntent {
        let intent_names: Vec<&str> = self.profile.intents.iter().map(|i| i.name).collect();
        let descriptions: String = self
            .profile
            .intents
            .iter()
            .map(|i| format!("- {}: {}", i.name, i.description))
            .collect::<Vec<_>>()
            .join("\n");

        let schema = OutputSchema::new(
            "intent_classification",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "intent": {"type": "string", "enum": intent_names},
                    "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                    "reasoning": {"type": "string"}
                },
                "required": ["intent", "confidence", "reasoning"],
                "additionalProperties": false
            }),
        );

        let system_prompt = self
            .prompts
            .get(self.profile.kind.as_str())
            .map(|s| s.system_prompt.clone())
            .unwrap_or_default();
        let messages = [
            Message::system(format!(
                "{system_prompt}\n\nClassify the user's message into exactly one intent:\n{descriptions}"
            )),
            Message::human(message.to_string()),
        ];
        let opts = CallOptions::new().with_temperature(0.1);

        match self.llm.structured(&messages, &schema, &opts).await {
            Ok(value) => match parse_structured::<IntentClassification>(value) {
                Ok(c) if self.profile.intent(&c.intent).is_some() => {
                    tracing::debug!(
                        specialist = %self.profile.kind,
                        intent = %c.intent,
                        reasoning = %c.reasoning,
                        "intent classified"
                    );
                    ClassifiedIntent {
                        intent: c.intent,
                        confidence: c.confidence.clamp(0.0, 1.0),
                        method: AssessmentMethod::LlmReasoning,
                    }
                }
                _ => self.fallback_classification("unparseable classification"),
            },
            Err(e) => self.fallback_classification(&e.to_string()),
        }
    }

    fn fallback_classification(&self, reason: &str) -> ClassifiedIntent {
        tracing::warn!(
            specialist = %self.profile.kind,
            reason,
            "intent classification fell back to default"
        );
        ClassifiedIntent {
            intent: self.profile.fallback_intent.to_string(),
            confidence: 0.5,
            method: AssessmentMethod::Fallback,
        }
    }

    async fn score_confidence(&self, message: &str, spec: &IntentSpec, base: f32) -> f32 {
        let schema = OutputSchema::new(
            "confidence_score",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0}
                },
                "required": ["confidence"],
                "additionalProperties": false
            }),
        );
        let messages = [
            Message::system(format!(
                "Rate how confident a {} should be answering this message under the '{}' \
                 intent, from 0.0 to 1.0.",
                self.profile.kind.specialist_type(),
                spec.name
            )),
            Message::human(message.to_string()),
        ];
        let opts = CallOptions::new().with_temperature(0.1);

        let scored = match self.llm.structured(&messages, &schema, &opts).await {
            Ok(value) => parse_structured::<ConfidenceScore>(value)
                .map(|s| s.confidence)
                .unwrap_or(base),
            Err(_) => base,
        };
        (scored + spec.confidence_adjustment).clamp(0.0, 1.0)
    }

    fn render_template(&self, intent: &str, message: &str) -> String {
        let agent_id = self.profile.kind.as_str();
        let template = self
            .prompts
            .template(agent_id, intent)
            .or_else(|| self.prompts.template(agent_id, self.profile.fallback_intent));
        match template {
            Some(t) => t.replace("{message}", message).trim().to_string(),
            None => format!(
                "Let's work on this together. Tell me more and I'll bring my {} experience to it.",
                self.profile.domains.first().copied().unwrap_or("career")
            ),
        }
    }
}
