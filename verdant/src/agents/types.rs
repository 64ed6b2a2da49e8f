//! Agent contract types: context, response, capabilities, and the trait.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::message::Message;

use super::SpecialistKind;

/// Per-turn context constructed fresh for each invocation; never persisted.
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    pub user_id: String,
    pub conversation_id: String,
    pub session_data: BTreeMap<String, serde_json::Value>,
    pub user_profile: Option<BTreeMap<String, serde_json::Value>>,
    pub conversation_history: Vec<Message>,
    pub tools_available: BTreeSet<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl AgentContext {
    pub fn new(user_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.conversation_history = history;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Standardized agent response; never mutated after emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub content: String,
    pub specialist_type: String,
    pub confidence_score: f32,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub next_actions: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub success: bool,
    pub error_message: Option<String>,
    pub processing_time_ms: Option<f64>,
}

impl AgentResponse {
    /// Failure response: plain-language apology with at least one next step.
    pub fn failure(kind: SpecialistKind, error_message: impl Into<String>) -> Self {
        Self {
            content: "I apologize, but I ran into a problem while working on that. Please try \
                      again, or rephrase your question and I'll take another look."
                .to_string(),
            specialist_type: kind.specialist_type().to_string(),
            confidence_score: 0.0,
            tools_used: Vec::new(),
            next_actions: vec!["Rephrase your question and try again".to_string()],
            sources: Vec::new(),
            metadata: BTreeMap::new(),
            success: false,
            error_message: Some(error_message.into()),
            processing_time_ms: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// What an agent can do; surfaced by the registry and the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AgentCapabilities {
    pub kind: SpecialistKind,
    pub specialist_type: &'static str,
    pub domains: Vec<String>,
    pub intents: Vec<String>,
    pub tools: Vec<String>,
}

/// The agent capability contract.
///
/// `handle_interaction` is total: every failure except auth (which never
/// reaches the core) is folded into an `AgentResponse { success: false, .. }`
/// with a safe message, so callers need no error branch.
#[async_trait]
pub trait Agent: Send + Sync {
    fn kind(&self) -> SpecialistKind;

    fn get_capabilities(&self) -> AgentCapabilities;

    async fn handle_interaction(
        &self,
        message: &str,
        user_id: &str,
        conversation_id: &str,
        session_data: Option<BTreeMap<String, serde_json::Value>>,
        user_profile: Option<BTreeMap<String, serde_json::Value>>,
    ) -> AgentResponse;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: failure responses carry an apology, a next action, and the error.
    #[test]
    fn failure_response_shape() {
        let r = AgentResponse::failure(SpecialistKind::Mai, "boom");
        assert!(!r.success);
        assert!(!r.content.is_empty());
        assert!(!r.next_actions.is_empty());
        assert_eq!(r.error_message.as_deref(), Some("boom"));
        assert_eq!(r.confidence_score, 0.0);
    }

    /// **Scenario**: AgentContext builder sets history and metadata.
    #[test]
    fn context_builder() {
        let ctx = AgentContext::new("u1", "c1")
            .with_history(vec![Message::human("hi")])
            .with_metadata("stage", serde_json::json!("analysis"));
        assert_eq!(ctx.user_id, "u1");
        assert_eq!(ctx.conversation_history.len(), 1);
        assert_eq!(ctx.metadata.get("stage"), Some(&serde_json::json!("analysis")));
    }
}
