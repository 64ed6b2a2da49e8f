//! Alex: emotional support and crisis specialist.
//!
//! Every interaction routes through the empathy sub-workflow (assessment →
//! empathy response or crisis escalation → action planning); the outcome is
//! folded into the standard `AgentResponse`. Crisis detections always carry
//! the 988 referral and `needs_human_escalation` metadata.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::llm::LlmClient;
use crate::memory::Episode;
use crate::prompts::PromptRegistry;
use crate::state::AssessmentMethod;
use crate::workflows::EmpathyWorkflow;

use super::roster::profile_for;
use super::runtime::SpecialistRuntime;
use super::types::{Agent, AgentCapabilities, AgentResponse};
use super::SpecialistKind;

pub struct AlexAgent {
    runtime: SpecialistRuntime,
    empathy: EmpathyWorkflow,
}

impl AlexAgent {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptRegistry>) -> Result<Self, CoreError> {
        let empathy = EmpathyWorkflow::new(llm.clone(), prompts.clone())
            .map_err(|e| CoreError::InternalInvariant(format!("empathy graph: {e}")))?;
        Ok(Self {
            runtime: SpecialistRuntime::new(
                profile_for(SpecialistKind::Alex),
                llm,
                prompts,
            ),
            empathy,
        })
    }
}

#[async_trait]
impl Agent for AlexAgent {
    fn kind(&self) -> SpecialistKind {
        SpecialistKind::Alex
    }

    fn get_capabilities(&self) -> AgentCapabilities {
        self.runtime.capabilities()
    }

    async fn handle_interaction(
        &self,
        message: &str,
        user_id: &str,
        conversation_id: &str,
        _session_data: Option<BTreeMap<String, serde_json::Value>>,
        _user_profile: Option<BTreeMap<String, serde_json::Value>>,
    ) -> AgentResponse {
        let started = Instant::now();
        if message.trim().is_empty() || user_id.trim().is_empty() || conversation_id.trim().is_empty()
        {
            let mut r = AgentResponse::failure(
                SpecialistKind::Alex,
                "message, user_id, and conversation_id are required",
            );
            r.processing_time_ms = Some(started.elapsed().as_secs_f64() * 1000.0);
            return r;
        }

        let outcome = self.empathy.run(message, user_id, conversation_id).await;

        let mut next_actions: Vec<String> = Vec::new();
        if outcome.needs_human_escalation {
            next_actions
                .push("Reach the 988 Suicide & Crisis Lifeline (call or text 988)".to_string());
        }
        next_actions.push(outcome.action_plan.follow_up.clone());
        next_actions.extend(outcome.action_plan.resources.iter().cloned());
        next_actions.truncate(3);

        let mut tools_used = vec!["empathy_workflow".to_string()];
        if outcome.needs_human_escalation {
            tools_used.push("crisis_escalation".to_string());
        }

        let confidence_score = match outcome.assessment.method {
            AssessmentMethod::LlmReasoning => 0.85,
            AssessmentMethod::Fallback => 0.6,
        };

        let mut metadata = BTreeMap::new();
        metadata.insert(
            "primary_emotion".to_string(),
            serde_json::json!(outcome.assessment.primary_emotion),
        );
        metadata.insert(
            "support_needed".to_string(),
            serde_json::json!(outcome.assessment.support_needed),
        );
        metadata.insert(
            "needs_human_escalation".to_string(),
            serde_json::json!(outcome.needs_human_escalation),
        );
        metadata.insert("workflow".to_string(), serde_json::json!("empathy"));

        let response = AgentResponse {
            content: outcome.response,
            specialist_type: SpecialistKind::Alex.specialist_type().to_string(),
            confidence_score,
            tools_used,
            next_actions,
            sources: vec!["988 Suicide & Crisis Lifeline".to_string()],
            metadata,
            success: true,
            error_message: None,
            processing_time_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
        };

        self.runtime
            .memory()
            .store_episode(
                Episode::new(format!("user: {message}\nagent: {}", response.content))
                    .with_attribute(
                        "primary_emotion",
                        serde_json::json!(outcome.assessment.primary_emotion),
                    )
                    .with_attribute("conversation_id", serde_json::json!(conversation_id)),
            )
            .await;
        let reflection = self.runtime.reflection().clone();
        let content = response.content.clone();
        tokio::spawn(async move {
            let _ = reflection.reflect(&content).await;
        });

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    fn crisis_assessment() -> serde_json::Value {
        serde_json::json!({
            "primary_emotion": "crisis",
            "intensity": 0.95,
            "support_needed": "high",
            "career_readiness": 0.2,
            "reasoning": "explicit hopelessness"
        })
    }

    /// **Scenario**: a crisis turn escalates: referral text in the content,
    /// escalation metadata set, crisis tool recorded.
    #[tokio::test]
    async fn crisis_turn_escalates_with_referral() {
        let llm = Arc::new(MockLlm::new().with_structured(crisis_assessment()));
        let prompts = Arc::new(PromptRegistry::from_embedded().unwrap());
        let alex = AlexAgent::new(llm, prompts).unwrap();

        let r = alex
            .handle_interaction("I feel hopeless about everything", "u1", "c1", None, None)
            .await;
        assert!(r.success);
        assert!(r.content.contains("988"), "crisis referral present: {}", r.content);
        assert_eq!(r.metadata["needs_human_escalation"], serde_json::json!(true));
        assert!(r.tools_used.contains(&"crisis_escalation".to_string()));
        assert!(r.processing_time_ms.unwrap() >= 0.0);
    }

    /// **Scenario**: assessment fallback (LLM down) still produces a
    /// supportive, non-crisis response with a next action.
    #[tokio::test]
    async fn fallback_assessment_still_supportive() {
        let llm = Arc::new(MockLlm::unavailable());
        let prompts = Arc::new(PromptRegistry::from_embedded().unwrap());
        let alex = AlexAgent::new(llm, prompts).unwrap();

        let r = alex
            .handle_interaction("I'm a bit nervous about switching fields", "u1", "c1", None, None)
            .await;
        assert!(r.success);
        assert!(!r.content.is_empty());
        assert!(!r.next_actions.is_empty());
        assert_eq!(r.metadata["needs_human_escalation"], serde_json::json!(false));
    }

    /// **Scenario**: empty message is rejected as invalid input.
    #[tokio::test]
    async fn empty_message_rejected() {
        let llm = Arc::new(MockLlm::new());
        let prompts = Arc::new(PromptRegistry::from_embedded().unwrap());
        let alex = AlexAgent::new(llm, prompts).unwrap();
        let r = alex.handle_interaction("", "u1", "c1", None, None).await;
        assert!(!r.success);
    }
}
