//! Conversation state: the central entity flowing through the supervisor graph.
//!
//! `ConversationState` is the graph state; nodes return a [`ConversationUpdate`]
//! delta which the engine merges with documented reducers:
//!
//! - `messages`: append-only, deduplicated by message id
//! - `incremental_findings`: append-only
//! - counters (`step_count`, `human_steering_count`): monotonic last-writer-wins
//! - everything else: last-writer-wins via `Option` fields on the delta
//!
//! Assessments ([`EmotionalAssessment`], [`RoutingAssessment`]) are the typed
//! results of structured LLM calls, with the method (`llm_reasoning` vs
//! `fallback`) always recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::SpecialistKind;
use crate::graph::GraphState;
use crate::message::Message;
use crate::workflows::PartnerMatch;

/// Coarse workflow stage, replaced by the last producing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    #[default]
    Discovery,
    Analysis,
    Steering,
    PartnerMatched,
    ConfidenceAssessed,
    ApplicationReady,
    Completed,
    Error,
}

impl WorkflowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::Discovery => "discovery",
            WorkflowStage::Analysis => "analysis",
            WorkflowStage::Steering => "steering",
            WorkflowStage::PartnerMatched => "partner_matched",
            WorkflowStage::ConfidenceAssessed => "confidence_assessed",
            WorkflowStage::ApplicationReady => "application_ready",
            WorkflowStage::Completed => "completed",
            WorkflowStage::Error => "error",
        }
    }
}

/// Kind of progress note appended to conversation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    InitialDiscovery,
    SpecialistAnalysis,
    PartnerMatches,
    ConfidenceAssessment,
    ApplicationGuidance,
    ConversationContinuation,
    Greeting,
}

/// A structured progress note. Append-only; never mutated after emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub insight: String,
    pub confidence: Option<f32>,
    pub agent: Option<SpecialistKind>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub next_actions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    pub fn new(kind: FindingKind, insight: impl Into<String>) -> Self {
        Self {
            kind,
            insight: insight.into(),
            confidence: None,
            agent: None,
            sources: Vec::new(),
            next_actions: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    pub fn with_agent(mut self, agent: SpecialistKind) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_next_actions(mut self, next_actions: Vec<String>) -> Self {
        self.next_actions = next_actions;
        self
    }
}

/// Arithmetic mean of the non-null per-finding confidences, `0.5` when there
/// are none. Kept pure so the 0.8 application gate is trivially testable;
/// routers call this once per decision and never recompute it ad hoc.
pub fn aggregate_confidence(findings: &[Finding]) -> f32 {
    let confidences: Vec<f32> = findings.iter().filter_map(|f| f.confidence).collect();
    if confidences.is_empty() {
        return 0.5;
    }
    confidences.iter().sum::<f32>() / confidences.len() as f32
}

/// Context surfaced to the human when the workflow wants steering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SteeringContext {
    pub message: Option<String>,
    pub latest_insight: Option<String>,
    pub suggested_next: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    pub confidence: Option<f32>,
}

/// Primary emotion detected by the empathy assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryEmotion {
    Crisis,
    Distressed,
    Anxious,
    Neutral,
    Positive,
    Stress,
    Confidence,
    Frustration,
    Excitement,
    Uncertainty,
}

/// How much support the user needs right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportLevel {
    Low,
    Moderate,
    High,
}

/// Whether an assessment came from the LLM or the conservative fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentMethod {
    LlmReasoning,
    Fallback,
}

/// Result of the emotional-state structured call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionalAssessment {
    pub primary_emotion: PrimaryEmotion,
    pub intensity: f32,
    pub support_needed: SupportLevel,
    pub career_readiness: f32,
    pub reasoning: String,
    pub method: AssessmentMethod,
}

impl EmotionalAssessment {
    /// Conservative default used when the LLM is unavailable or returns
    /// malformed output: neutral, moderate support, no crisis.
    pub fn fallback(reasoning: impl Into<String>) -> Self {
        Self {
            primary_emotion: PrimaryEmotion::Neutral,
            intensity: 0.5,
            support_needed: SupportLevel::Moderate,
            career_readiness: 0.5,
            reasoning: reasoning.into(),
            method: AssessmentMethod::Fallback,
        }
    }

    pub fn is_crisis(&self) -> bool {
        self.primary_emotion == PrimaryEmotion::Crisis
    }
}

/// Top-level intent the supervisor routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingIntent {
    CrisisSupport,
    SpecificSpecialistNeeded,
    UserAssessmentNeeded,
    ClimateOverviewNeeded,
    GeneralCoordination,
}

/// Urgency of the turn, from the routing assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Moderate,
    High,
    Crisis,
}

/// Result of the supervisor's routing structured call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingAssessment {
    pub primary_intent: RoutingIntent,
    pub urgency: Urgency,
    pub recommended_specialist: Option<SpecialistKind>,
    pub specialist_confidence: f32,
    pub reasoning: String,
}

impl RoutingAssessment {
    /// Default used when the routing structured call fails.
    pub fn fallback(reasoning: impl Into<String>) -> Self {
        Self {
            primary_intent: RoutingIntent::GeneralCoordination,
            urgency: Urgency::Moderate,
            recommended_specialist: None,
            specialist_confidence: 0.5,
            reasoning: reasoning.into(),
        }
    }
}

/// Graph state for the supervisor workflow. Shared by value between nodes; a
/// conversation is exclusively owned by one graph execution per turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub user_id: String,
    pub session_id: String,
    pub needs_human_review: bool,
    pub human_steering_context: Option<SteeringContext>,
    pub workflow_state: WorkflowStage,
    pub human_steering_count: u32,
    pub step_count: u32,
    pub waiting_for_input: bool,
    pub incremental_findings: Vec<Finding>,
    /// Prior-turn history provided by the session tracker; not touched by reducers.
    pub conversation_history: Vec<Message>,
    pub partner_matches: Vec<PartnerMatch>,
    pub conversation_complete: bool,
}

impl ConversationState {
    /// Builds the state for one turn from the incoming human message.
    pub fn for_turn(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        message: Message,
        history: Vec<Message>,
    ) -> Self {
        Self {
            messages: vec![message],
            user_id: user_id.into(),
            session_id: session_id.into(),
            conversation_history: history,
            ..Self::default()
        }
    }

    /// Mean confidence over findings; see [`aggregate_confidence`].
    pub fn overall_confidence(&self) -> f32 {
        aggregate_confidence(&self.incremental_findings)
    }

    /// Latest human message content in this turn, if any.
    pub fn latest_human_message(&self) -> Option<&str> {
        crate::message::latest_human_content(&self.messages)
    }
}

/// Partial state update returned by a supervisor workflow node.
///
/// Builder-style; unset fields leave the current state untouched.
#[derive(Debug, Clone, Default)]
pub struct ConversationUpdate {
    pub messages: Vec<Message>,
    pub findings: Vec<Finding>,
    pub needs_human_review: Option<bool>,
    pub human_steering_context: Option<SteeringContext>,
    pub workflow_state: Option<WorkflowStage>,
    pub human_steering_count: Option<u32>,
    pub step_count: Option<u32>,
    pub waiting_for_input: Option<bool>,
    pub partner_matches: Option<Vec<PartnerMatch>>,
    pub conversation_complete: Option<bool>,
}

impl ConversationUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_finding(mut self, finding: Finding) -> Self {
        self.findings.push(finding);
        self
    }

    pub fn with_stage(mut self, stage: WorkflowStage) -> Self {
        self.workflow_state = Some(stage);
        self
    }

    pub fn with_steering_context(mut self, ctx: SteeringContext) -> Self {
        self.human_steering_context = Some(ctx);
        self
    }

    pub fn needs_review(mut self, needs: bool) -> Self {
        self.needs_human_review = Some(needs);
        self
    }

    pub fn waiting(mut self, waiting: bool) -> Self {
        self.waiting_for_input = Some(waiting);
        self
    }

    pub fn complete(mut self) -> Self {
        self.conversation_complete = Some(true);
        self
    }

    /// Sets the step counter to `current + 1`; the reducer takes the max so a
    /// replayed delta cannot regress the counter.
    pub fn bump_step(mut self, current: u32) -> Self {
        self.step_count = Some(current + 1);
        self
    }

    pub fn with_steering_count(mut self, count: u32) -> Self {
        self.human_steering_count = Some(count);
        self
    }

    pub fn with_partner_matches(mut self, matches: Vec<PartnerMatch>) -> Self {
        self.partner_matches = Some(matches);
        self
    }
}

impl GraphState for ConversationState {
    type Delta = ConversationUpdate;

    fn apply(&mut self, delta: Self::Delta) {
        use crate::channels::{append_by_key, monotonic_max, replace};

        append_by_key(&mut self.messages, delta.messages, |m| m.id);
        self.incremental_findings.extend(delta.findings);
        replace(&mut self.needs_human_review, delta.needs_human_review);
        replace(
            &mut self.human_steering_context,
            delta.human_steering_context.map(Some),
        );
        replace(&mut self.workflow_state, delta.workflow_state);
        monotonic_max(&mut self.human_steering_count, delta.human_steering_count);
        monotonic_max(&mut self.step_count, delta.step_count);
        replace(&mut self.waiting_for_input, delta.waiting_for_input);
        replace(
            &mut self.partner_matches,
            delta.partner_matches,
        );
        replace(&mut self.conversation_complete, delta.conversation_complete);
    }

    fn error_delta(message: &str) -> Self::Delta {
        ConversationUpdate::new()
            .with_message(Message::ai(
                "I ran into a technical issue while working on that. Let me connect you with our \
                 team, or you can try rephrasing your question.",
            ))
            .with_stage(WorkflowStage::Error)
            .needs_review(true)
            .with_message(Message::system(format!("node error: {message}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding_with(conf: Option<f32>) -> Finding {
        let f = Finding::new(FindingKind::SpecialistAnalysis, "insight");
        match conf {
            Some(c) => f.with_confidence(c),
            None => f,
        }
    }

    /// **Scenario**: mean of non-null confidences; findings without a score are skipped.
    #[test]
    fn aggregate_confidence_mean_of_non_null() {
        let findings = vec![
            finding_with(Some(0.9)),
            finding_with(None),
            finding_with(Some(0.7)),
        ];
        let c = aggregate_confidence(&findings);
        assert!((c - 0.8).abs() < 1e-6, "{c}");
    }

    /// **Scenario**: no findings (or none with confidence) yields the 0.5 default.
    #[test]
    fn aggregate_confidence_default_half() {
        assert_eq!(aggregate_confidence(&[]), 0.5);
        assert_eq!(aggregate_confidence(&[finding_with(None)]), 0.5);
    }

    /// **Scenario**: confidence is clamped into [0, 1] at construction.
    #[test]
    fn finding_confidence_clamped() {
        let f = Finding::new(FindingKind::Greeting, "x").with_confidence(1.7);
        assert_eq!(f.confidence, Some(1.0));
        let f = Finding::new(FindingKind::Greeting, "x").with_confidence(-0.3);
        assert_eq!(f.confidence, Some(0.0));
    }

    /// **Scenario**: applying the same message delta twice appends the message once.
    #[test]
    fn apply_message_delta_is_idempotent() {
        let mut state = ConversationState::for_turn("u1", "s1", Message::human("hi"), vec![]);
        let delta = ConversationUpdate::new().with_message(Message::ai("reply"));
        state.apply(delta.clone());
        state.apply(delta);
        assert_eq!(state.messages.len(), 2, "human + one ai, no duplicate");
    }

    /// **Scenario**: counters never regress when an older delta is re-applied.
    #[test]
    fn apply_counters_are_monotonic() {
        let mut state = ConversationState::default();
        state.apply(ConversationUpdate::new().bump_step(4)); // step_count -> 5
        state.apply(ConversationUpdate::new().bump_step(1)); // stale delta: 2
        assert_eq!(state.step_count, 5);

        state.apply(ConversationUpdate::new().with_steering_count(2));
        state.apply(ConversationUpdate::new().with_steering_count(1));
        assert_eq!(state.human_steering_count, 2);
    }

    /// **Scenario**: scalar fields are replaced by the last producing delta.
    #[test]
    fn apply_scalars_last_writer_wins() {
        let mut state = ConversationState::default();
        state.apply(ConversationUpdate::new().with_stage(WorkflowStage::Analysis));
        state.apply(ConversationUpdate::new().with_stage(WorkflowStage::PartnerMatched));
        assert_eq!(state.workflow_state, WorkflowStage::PartnerMatched);
        assert!(!state.conversation_complete);
        state.apply(ConversationUpdate::new().complete());
        assert!(state.conversation_complete);
    }

    /// **Scenario**: findings append in order across deltas.
    #[test]
    fn apply_findings_append_in_order() {
        let mut state = ConversationState::default();
        state.apply(ConversationUpdate::new().with_finding(Finding::new(
            FindingKind::InitialDiscovery,
            "first",
        )));
        state.apply(ConversationUpdate::new().with_finding(Finding::new(
            FindingKind::SpecialistAnalysis,
            "second",
        )));
        assert_eq!(state.incremental_findings.len(), 2);
        assert_eq!(state.incremental_findings[0].insight, "first");
        assert_eq!(state.incremental_findings[1].insight, "second");
    }

    /// **Scenario**: the error delta flags review, keeps a plain-language AI
    /// message, and records the node error as a system message.
    #[test]
    fn error_delta_flags_review_with_safe_message() {
        let mut state = ConversationState::default();
        state.apply(ConversationState::error_delta("boom"));
        assert!(state.needs_human_review);
        assert_eq!(state.workflow_state, WorkflowStage::Error);
        assert!(state.messages.iter().any(|m| m.is_ai()));
        assert!(state
            .messages
            .iter()
            .any(|m| m.kind == crate::message::MessageKind::System && m.content.contains("boom")));
    }
}
