//! Pendo: the routing supervisor.
//!
//! On top of the shared contract, pendo assesses routing (structured LLM
//! call producing a [`RoutingAssessment`], falling back to general
//! coordination) and delegates to a named specialist resolved through the
//! read-only registry, stamping the delegation on the returned response.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::llm::{parse_structured, CallOptions, LlmClient, OutputSchema};
use crate::message::Message;
use crate::prompts::PromptRegistry;
use crate::state::RoutingAssessment;

use super::registry::AgentRegistry;
use super::roster::profile_for;
use super::runtime::SpecialistRuntime;
use super::types::{Agent, AgentCapabilities, AgentContext, AgentResponse};
use super::SpecialistKind;

/// Specialist trigger table shown to the routing classifier.
const ROUTING_TRIGGERS: &str = "\
- alex: emotional support and crisis (distress, overwhelm, hopelessness)
- mai: resume, LinkedIn, interviews, career transitions
- marcus: military service, MOS translation, VA and veteran programs
- liv: visas, credential evaluation, non-US experience
- miguel: community organizing, equity, frontline communities
- jasmine: students, internships, entry-level (18+)
- lauren: green jobs, renewable energy, climate sector information";

pub struct PendoAgent {
    runtime: SpecialistRuntime,
    llm: Arc<dyn LlmClient>,
}

impl PendoAgent {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptRegistry>) -> Self {
        Self {
            runtime: SpecialistRuntime::new(
                profile_for(SpecialistKind::Pendo),
                llm.clone(),
                prompts,
            ),
            llm,
        }
    }

    /// Classifies a turn for routing. Total: a failed or malformed structured
    /// call falls back to `general_coordination`.
    pub async fn assess_routing(&self, message: &str) -> RoutingAssessment {
        let specialists: Vec<&str> = SpecialistKind::specialists()
            .iter()
            .map(|k| k.as_str())
            .collect();
        let schema = OutputSchema::new(
            "routing_assessment",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "primary_intent": {
                        "type": "string",
                        "enum": [
                            "crisis_support",
                            "specific_specialist_needed",
                            "user_assessment_needed",
                            "climate_overview_needed",
                            "general_coordination"
                        ]
                    },
                    "urgency": {"type": "string", "enum": ["low", "moderate", "high", "crisis"]},
                    "recommended_specialist": {
                        "anyOf": [
                            {"type": "string", "enum": specialists},
                            {"type": "null"}
                        ]
                    },
                    "specialist_confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                    "reasoning": {"type": "string"}
                },
                "required": [
                    "primary_intent",
                    "urgency",
                    "recommended_specialist",
                    "specialist_confidence",
                    "reasoning"
                ],
                "additionalProperties": false
            }),
        );

        let messages = [
            Message::system(format!(
                "You route climate-career conversations to specialists. Pick the primary \
                 intent, urgency, and (when one clearly fits) a recommended specialist.\n\n\
                 Specialists and their triggers:\n{ROUTING_TRIGGERS}"
            )),
            Message::human(message.to_string()),
        ];
        let opts = CallOptions::new().with_temperature(0.1);

        match self.llm.structured(&messages, &schema, &opts).await {
            Ok(value) => match parse_structured::<RoutingAssessment>(value) {
                Ok(assessment) => {
                    tracing::debug!(
                        intent = ?assessment.primary_intent,
                        specialist = ?assessment.recommended_specialist,
                        "routing assessed"
                    );
                    assessment
                }
                Err(e) => {
                    tracing::warn!(error = %e, "routing parse fell back");
                    RoutingAssessment::fallback("routing output did not parse")
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "routing assessment fell back");
                RoutingAssessment::fallback("routing assessment unavailable")
            }
        }
    }

    /// Invokes the named specialist through the registry and stamps the
    /// returned response with `delegated_by` and a delegation timestamp.
    pub async fn delegate_to_specialist(
        &self,
        registry: &AgentRegistry,
        specialist: SpecialistKind,
        message: &str,
        context: &AgentContext,
    ) -> AgentResponse {
        let Some(agent) = registry.get(specialist) else {
            tracing::error!(specialist = %specialist, "delegation target not registered");
            return AgentResponse::failure(
                SpecialistKind::Pendo,
                format!("specialist {specialist} is not available"),
            );
        };

        tracing::info!(specialist = %specialist, "supervisor delegating");
        let response = agent
            .handle_interaction(
                message,
                &context.user_id,
                &context.conversation_id,
                Some(context.session_data.clone()),
                context.user_profile.clone(),
            )
            .await;

        response
            .with_metadata("delegated_by", serde_json::json!("pendo"))
            .with_metadata(
                "delegation_timestamp",
                serde_json::json!(Utc::now().to_rfc3339()),
            )
    }
}

#[async_trait]
impl Agent for PendoAgent {
    fn kind(&self) -> SpecialistKind {
        SpecialistKind::Pendo
    }

    fn get_capabilities(&self) -> AgentCapabilities {
        self.runtime.capabilities()
    }

    async fn handle_interaction(
        &self,
        message: &str,
        user_id: &str,
        conversation_id: &str,
        session_data: Option<BTreeMap<String, serde_json::Value>>,
        user_profile: Option<BTreeMap<String, serde_json::Value>>,
    ) -> AgentResponse {
        self.runtime
            .handle(message, user_id, conversation_id, session_data, user_profile)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    fn pendo_with(llm: MockLlm) -> PendoAgent {
        PendoAgent::new(
            Arc::new(llm),
            Arc::new(PromptRegistry::from_embedded().unwrap()),
        )
    }

    /// **Scenario**: a veteran message routes to marcus with the scripted
    /// assessment.
    #[tokio::test]
    async fn veteran_routing_assessment() {
        let llm = MockLlm::new().with_structured(serde_json::json!({
            "primary_intent": "specific_specialist_needed",
            "urgency": "moderate",
            "recommended_specialist": "marcus",
            "specialist_confidence": 0.92,
            "reasoning": "11B MOS and veteran status"
        }));
        let pendo = pendo_with(llm);
        let a = pendo
            .assess_routing("I'm an Army veteran with an 11B MOS exploring climate careers.")
            .await;
        assert_eq!(a.recommended_specialist, Some(SpecialistKind::Marcus));
        assert!(a.specialist_confidence > 0.9);
    }

    /// **Scenario**: a failed routing call falls back to general coordination
    /// with no recommended specialist.
    #[tokio::test]
    async fn routing_fallback_on_failure() {
        let pendo = pendo_with(MockLlm::new().with_structured_failure());
        let a = pendo.assess_routing("anything").await;
        assert_eq!(
            a.primary_intent,
            crate::state::RoutingIntent::GeneralCoordination
        );
        assert!(a.recommended_specialist.is_none());
    }

    /// **Scenario**: delegation to an unregistered specialist fails safely.
    #[tokio::test]
    async fn delegation_to_missing_specialist_fails_safely() {
        let pendo = pendo_with(MockLlm::new());
        let registry = AgentRegistry::empty();
        let ctx = AgentContext::new("u1", "c1");
        let r = pendo
            .delegate_to_specialist(&registry, SpecialistKind::Mai, "hello", &ctx)
            .await;
        assert!(!r.success);
        assert!(r.error_message.unwrap().contains("mai"));
    }
}
