//! Empathy sub-workflow, invoked by alex.
//!
//! Three strictly sequential stages: `emotional_assessment` →
//! (`alex_empathy_response` | `crisis_escalation`) → `action_planning`. The
//! escalation branch is taken exactly when the assessment detects crisis; it
//! sets `needs_human_escalation` and embeds the 988 referral. Action planning
//! always emits a structured plan.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::graph::{
    CompilationError, CompiledStateGraph, GraphState, Next, Node, RunContext, StateGraph, END,
    START,
};
use crate::llm::{parse_structured, CallOptions, LlmClient, OutputSchema};
use crate::message::Message;
use crate::prompts::PromptRegistry;
use crate::state::{AssessmentMethod, EmotionalAssessment, PrimaryEmotion, SupportLevel};

/// Crisis referral line embedded in every escalation response.
const CRISIS_REFERRAL: &str =
    "Please consider reaching out to the 988 Suicide & Crisis Lifeline (call or text 988).";

/// Structured support plan produced by the final stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlan {
    pub guidance: String,
    pub resources: Vec<String>,
    pub follow_up: String,
}

/// Graph state for one empathy run.
#[derive(Debug, Clone, Default)]
pub struct EmpathyState {
    pub message: String,
    pub user_id: String,
    pub session_id: String,
    pub assessment: Option<EmotionalAssessment>,
    pub crisis_detected: bool,
    pub response: Option<String>,
    pub needs_human_escalation: bool,
    pub action_plan: Option<ActionPlan>,
}

/// Delta for the empathy graph; all fields last-writer-wins.
#[derive(Debug, Clone, Default)]
pub struct EmpathyUpdate {
    pub assessment: Option<EmotionalAssessment>,
    pub crisis_detected: Option<bool>,
    pub response: Option<String>,
    pub needs_human_escalation: Option<bool>,
    pub action_plan: Option<ActionPlan>,
}

impl GraphState for EmpathyState {
    type Delta = EmpathyUpdate;

    fn apply(&mut self, delta: Self::Delta) {
        use crate::channels::replace;
        replace(&mut self.assessment, delta.assessment.map(Some));
        replace(&mut self.crisis_detected, delta.crisis_detected);
        replace(&mut self.response, delta.response.map(Some));
        replace(&mut self.needs_human_escalation, delta.needs_human_escalation);
        replace(&mut self.action_plan, delta.action_plan.map(Some));
    }

    fn error_delta(_message: &str) -> Self::Delta {
        EmpathyUpdate {
            response: Some(
                "I'm here to support you through this. Let's work together to find a path \
                 forward."
                    .to_string(),
            ),
            action_plan: Some(ActionPlan {
                guidance: "Take things one step at a time and remember that support is available."
                    .to_string(),
                resources: vec![
                    "988 Suicide & Crisis Lifeline".to_string(),
                    "Local mental health services".to_string(),
                ],
                follow_up: "Continue seeking support as needed".to_string(),
            }),
            ..EmpathyUpdate::default()
        }
    }
}

/// Result handed back to alex.
#[derive(Debug, Clone)]
pub struct EmpathyOutcome {
    pub assessment: EmotionalAssessment,
    pub response: String,
    pub needs_human_escalation: bool,
    pub action_plan: ActionPlan,
}

struct EmotionalAssessmentNode {
    llm: Arc<dyn LlmClient>,
}

#[async_trait]
impl Node<EmpathyState> for EmotionalAssessmentNode {
    fn id(&self) -> &str {
        "emotional_assessment"
    }

    async fn run(
        &self,
        state: EmpathyState,
        _ctx: &RunContext<EmpathyState>,
    ) -> Result<(EmpathyUpdate, Next), CoreError> {
        let schema = OutputSchema::new(
            "emotional_assessment",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "primary_emotion": {
                        "type": "string",
                        "enum": ["crisis", "distressed", "anxious", "neutral", "positive"]
                    },
                    "intensity": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                    "support_needed": {"type": "string", "enum": ["low", "moderate", "high"]},
                    "career_readiness": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                    "reasoning": {"type": "string"}
                },
                "required": [
                    "primary_emotion", "intensity", "support_needed",
                    "career_readiness", "reasoning"
                ],
                "additionalProperties": false
            }),
        );

        #[derive(Deserialize)]
        struct RawAssessment {
            primary_emotion: PrimaryEmotion,
            intensity: f32,
            support_needed: SupportLevel,
            career_readiness: f32,
            reasoning: String,
        }

        let messages = [
            Message::system(
                "You are an emotional intelligence specialist. Assess the emotional state of \
                 the message: crisis (self-harm ideation, hopelessness with no future \
                 perspective, immediate danger), distressed (severe distress or breakdown), \
                 anxious (worry or career stress), neutral, or positive. Consider context and \
                 tone, not just keywords.",
            ),
            Message::human(state.message.clone()),
        ];
        let opts = CallOptions::new().with_temperature(0.1);

        let assessment = match self.llm.structured(&messages, &schema, &opts).await {
            Ok(value) => match parse_structured::<RawAssessment>(value) {
                Ok(raw) => EmotionalAssessment {
                    primary_emotion: raw.primary_emotion,
                    intensity: raw.intensity.clamp(0.0, 1.0),
                    support_needed: raw.support_needed,
                    career_readiness: raw.career_readiness.clamp(0.0, 1.0),
                    reasoning: raw.reasoning,
                    method: AssessmentMethod::LlmReasoning,
                },
                Err(e) => {
                    tracing::warn!(error = %e, "emotional assessment parse fell back to neutral");
                    EmotionalAssessment::fallback("assessment output did not parse")
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "emotional assessment fell back to neutral");
                EmotionalAssessment::fallback("unable to assess emotional state")
            }
        };

        let crisis = assessment.is_crisis();
        tracing::info!(emotion = ?assessment.primary_emotion, crisis, "emotional assessment");
        Ok((
            EmpathyUpdate {
                crisis_detected: Some(crisis),
                assessment: Some(assessment),
                ..EmpathyUpdate::default()
            },
            Next::Continue,
        ))
    }
}

struct EmpathyResponseNode {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptRegistry>,
}

#[async_trait]
impl Node<EmpathyState> for EmpathyResponseNode {
    fn id(&self) -> &str {
        "alex_empathy_response"
    }

    async fn run(
        &self,
        state: EmpathyState,
        _ctx: &RunContext<EmpathyState>,
    ) -> Result<(EmpathyUpdate, Next), CoreError> {
        let template = self
            .prompts
            .template("alex", "emotional_support")
            .unwrap_or("I understand you're going through a difficult time. I'm here to support you.")
            .to_string();

        let system_prompt = self
            .prompts
            .get("alex")
            .map(|s| s.system_prompt.clone())
            .unwrap_or_default();
        let messages = [
            Message::system(system_prompt),
            Message::human(state.message.clone()),
        ];
        let response = match self
            .llm
            .complete(&messages, &CallOptions::new().with_temperature(0.7))
            .await
        {
            Ok(completion) if !completion.content.trim().is_empty() => completion.content,
            _ => template,
        };

        Ok((
            EmpathyUpdate {
                response: Some(response),
                needs_human_escalation: Some(false),
                ..EmpathyUpdate::default()
            },
            Next::Continue,
        ))
    }
}

struct CrisisEscalationNode {
    prompts: Arc<PromptRegistry>,
}

#[async_trait]
impl Node<EmpathyState> for CrisisEscalationNode {
    fn id(&self) -> &str {
        "crisis_escalation"
    }

    async fn run(
        &self,
        _state: EmpathyState,
        _ctx: &RunContext<EmpathyState>,
    ) -> Result<(EmpathyUpdate, Next), CoreError> {
        // Crisis responses are fixed text, not generated: the referral must be
        // present verbatim regardless of gateway health.
        let mut response = self
            .prompts
            .template("alex", "crisis_intervention")
            .unwrap_or("I'm really glad you told me this, and I'm concerned about you.")
            .to_string();
        if !response.contains("988") {
            response.push(' ');
            response.push_str(CRISIS_REFERRAL);
        }

        tracing::warn!("crisis escalation: human follow-up required");
        Ok((
            EmpathyUpdate {
                response: Some(response),
                needs_human_escalation: Some(true),
                ..EmpathyUpdate::default()
            },
            Next::Continue,
        ))
    }
}

struct ActionPlanningNode {
    llm: Arc<dyn LlmClient>,
}

#[async_trait]
impl Node<EmpathyState> for ActionPlanningNode {
    fn id(&self) -> &str {
        "action_planning"
    }

    async fn run(
        &self,
        state: EmpathyState,
        _ctx: &RunContext<EmpathyState>,
    ) -> Result<(EmpathyUpdate, Next), CoreError> {
        let crisis = state.crisis_detected;
        let resources = if crisis {
            vec![
                "988 Suicide & Crisis Lifeline (call or text 988)".to_string(),
                "Local mental health services".to_string(),
            ]
        } else {
            vec![
                "Verdant career support sessions".to_string(),
                "Peer community for climate career changers".to_string(),
            ]
        };
        let follow_up = if crisis {
            "Check in with someone you trust within 24 hours".to_string()
        } else {
            "Pick one small step to take this week".to_string()
        };

        let messages = [
            Message::system(
                "Offer one short, supportive paragraph of guidance for moving forward, \
                 grounded in what the user shared.",
            ),
            Message::human(state.message.clone()),
        ];
        let guidance = match self
            .llm
            .complete(&messages, &CallOptions::new().with_temperature(0.7))
            .await
        {
            Ok(completion) if !completion.content.trim().is_empty() => completion.content,
            _ => "Take things one step at a time; you don't have to solve everything today, \
                  and support is available."
                .to_string(),
        };

        Ok((
            EmpathyUpdate {
                action_plan: Some(ActionPlan {
                    guidance,
                    resources,
                    follow_up,
                }),
                ..EmpathyUpdate::default()
            },
            Next::End,
        ))
    }
}

/// The compiled empathy graph.
pub struct EmpathyWorkflow {
    graph: CompiledStateGraph<EmpathyState>,
}

impl EmpathyWorkflow {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptRegistry>,
    ) -> Result<Self, CompilationError> {
        let mut graph = StateGraph::new();
        graph.add_node(
            "emotional_assessment",
            Arc::new(EmotionalAssessmentNode { llm: llm.clone() }),
        );
        graph.add_node(
            "alex_empathy_response",
            Arc::new(EmpathyResponseNode {
                llm: llm.clone(),
                prompts: prompts.clone(),
            }),
        );
        graph.add_node("crisis_escalation", Arc::new(CrisisEscalationNode { prompts }));
        graph.add_node("action_planning", Arc::new(ActionPlanningNode { llm }));

        graph.add_edge(START, "emotional_assessment");
        let path_map: HashMap<String, String> = [
            ("crisis".to_string(), "crisis_escalation".to_string()),
            ("support".to_string(), "alex_empathy_response".to_string()),
        ]
        .into_iter()
        .collect();
        graph.add_conditional_edges(
            "emotional_assessment",
            Arc::new(|state: &EmpathyState| {
                if state.crisis_detected {
                    "crisis".to_string()
                } else {
                    "support".to_string()
                }
            }),
            Some(path_map),
        );
        graph.add_edge("alex_empathy_response", "action_planning");
        graph.add_edge("crisis_escalation", "action_planning");
        graph.add_edge("action_planning", END);

        Ok(Self {
            graph: graph.compile()?,
        })
    }

    /// Runs one empathy turn. Total: engine-level failures land on the
    /// fallback response and plan.
    pub async fn run(&self, message: &str, user_id: &str, session_id: &str) -> EmpathyOutcome {
        let state = EmpathyState {
            message: message.to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            ..EmpathyState::default()
        };

        let final_state = match self.graph.invoke(state, None).await {
            Ok(s) => s,
            Err(e) => {
                // The empathy graph has no interrupts; reaching here is a bug,
                // but the user still gets a supportive default.
                tracing::error!(error = %e, "empathy graph failed");
                let mut s = EmpathyState::default();
                s.apply(EmpathyState::error_delta(&e.to_string()));
                s
            }
        };

        let fallback_plan = ActionPlan {
            guidance: "Take things one step at a time and remember that support is available."
                .to_string(),
            resources: vec!["988 Suicide & Crisis Lifeline".to_string()],
            follow_up: "Continue seeking support as needed".to_string(),
        };

        EmpathyOutcome {
            assessment: final_state
                .assessment
                .unwrap_or_else(|| EmotionalAssessment::fallback("assessment unavailable")),
            response: final_state.response.unwrap_or_else(|| {
                "I'm here to support you through this. Let's work together to find a path \
                 forward."
                    .to_string()
            }),
            needs_human_escalation: final_state.needs_human_escalation,
            action_plan: final_state.action_plan.unwrap_or(fallback_plan),
        }
    }
}
