//! Supervisor workflow: the top-level graph that routes turns, invokes
//! specialists, runs the partner-match and confidence stages, and surfaces
//! steering interrupts.
//!
//! Termination is guarded by three conditions checked in every router:
//! `conversation_complete`, `step_count ≥ 10`, and `human_steering_count ≥ 3`.
//! Nodes bump `step_count` in their deltas so routers stay pure; the
//! confidence gate reads [`aggregate_confidence`] and is never recomputed ad
//! hoc.

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::{Agent, AgentContext, AgentRegistry, AgentResponse, SpecialistKind};
use crate::error::CoreError;
use crate::graph::{
    CompilationError, CompiledStateGraph, Next, Node, RunContext, StateGraph, END, START,
};
use crate::memory::{Checkpointer, RunnableConfig};
use crate::message::Message;
use crate::state::{
    aggregate_confidence, ConversationState, ConversationUpdate, Finding, FindingKind,
    RoutingIntent, SteeringContext, Urgency, WorkflowStage,
};
use crate::stream::{StreamEvent, StreamMode};

use super::partners::{match_confidence, PartnerDirectory};

/// Steering attempts before the workflow summarizes and ends.
pub const MAX_STEERING: u32 = 3;
/// Workflow steps before the routers force END.
pub const MAX_STEPS: u32 = 10;
/// Overall-confidence threshold separating application guidance from
/// continued exploration.
pub const CONFIDENCE_GATE: f32 = 0.8;

/// Bare greetings answered in one hop. Full-string match only, after trim,
/// case-insensitive; substrings never trigger.
const GREETINGS: [&str; 6] = ["hi", "hello", "hey", "sup", "yo", "howdy"];

/// Delegation threshold: below this the supervisor answers directly.
const DELEGATION_CONFIDENCE: f32 = 0.6;

/// Whether the whole message is one of the greeting literals.
pub fn is_bare_greeting(text: &str) -> bool {
    let trimmed = text.trim();
    GREETINGS.iter().any(|g| trimmed.eq_ignore_ascii_case(g))
}

/// Climate interest named in the message, for discovery findings.
fn extract_interest_area(message: &str) -> &'static str {
    const AREAS: [&str; 8] = [
        "renewable energy",
        "sustainability",
        "climate tech",
        "environmental",
        "green jobs",
        "carbon",
        "solar",
        "wind",
    ];
    let lower = message.to_lowercase();
    AREAS
        .iter()
        .find(|area| lower.contains(*area))
        .copied()
        .unwrap_or("climate careers")
}

/// First two sentences of a response, used as the key insight of a finding.
fn first_two_sentences(content: &str) -> String {
    let sentences: Vec<&str> = content
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(2)
        .collect();
    if sentences.is_empty() {
        let mut short: String = content.chars().take(100).collect();
        if content.chars().count() > 100 {
            short.push_str("...");
        }
        short
    } else {
        format!("{}.", sentences.join(". "))
    }
}

/// Node a steering reply routes to, from intent keywords in the text.
fn steering_target(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));
    if has(&["search", "find", "jobs", "opportunities"]) {
        "partner_matching"
    } else if has(&["analyze", "assess", "background", "skills"]) {
        "incremental_analysis"
    } else if has(&["plan", "strategy", "roadmap", "transition"]) {
        "confidence_assessment"
    } else if has(&["apply", "connect", "introduction", "network"]) {
        "application_guidance"
    } else {
        "incremental_analysis"
    }
}

/// Analysis-specialist rotation: mai first, then lauren, then marcus, then
/// back to lauren.
fn select_analysis_specialist(findings: &[Finding]) -> SpecialistKind {
    match findings.last() {
        None => SpecialistKind::Mai,
        Some(f) if f.kind == FindingKind::InitialDiscovery => SpecialistKind::Mai,
        Some(f) => match f.agent {
            Some(SpecialistKind::Mai) => SpecialistKind::Lauren,
            Some(SpecialistKind::Lauren) => SpecialistKind::Marcus,
            _ => SpecialistKind::Lauren,
        },
    }
}

/// Display confidence for guidance text: grows with findings, capped at 90%.
fn confidence_percent(findings: &[Finding]) -> u32 {
    ((findings.len() as u32) * 20 + 10).min(90)
}

fn stage_question(stage: WorkflowStage) -> &'static str {
    match stage {
        WorkflowStage::Discovery => "What aspect of climate careers would you like to explore first?",
        WorkflowStage::Analysis | WorkflowStage::Steering => {
            "Which strategic direction interests you most?"
        }
        WorkflowStage::ConfidenceAssessed | WorkflowStage::PartnerMatched => {
            "What's your priority action for this week?"
        }
        _ => "How can I help you advance your climate career today?",
    }
}

fn available_tools() -> serde_json::Value {
    serde_json::json!({
        "resume_analysis": "AI-powered resume optimization and skills extraction",
        "partner_matching": "Direct connections with climate organizations",
        "market_insights": "Climate job market data and trends",
        "skill_development": "Personalized learning paths for climate careers",
        "networking": "Climate professional network and mentorship",
        "interview_prep": "Climate-specific interview preparation"
    })
}

/// Payload surfaced through the steering interrupt.
fn guidance_context(state: &ConversationState) -> serde_json::Value {
    serde_json::json!({
        "kind": "comprehensive_guidance",
        "question": stage_question(state.workflow_state),
        "database_summary": format!(
            "{} findings so far; partner network available for matching",
            state.incremental_findings.len()
        ),
        "available_tools": available_tools(),
        "example_inputs": [
            "Find me jobs in solar energy",
            "Analyze my skills for wind energy roles",
            "Help me plan my transition strategy",
            "Connect me with hiring partners"
        ],
        "suggested_actions": [
            "Search partner opportunities",
            "Assess your background",
            "Build a transition roadmap",
            "Start an application"
        ],
        "progress": {
            "findings": state.incremental_findings.len(),
            "confidence_percent": confidence_percent(&state.incremental_findings)
        }
    })
}

/// AI-visible version of the guidance payload.
fn guidance_message(state: &ConversationState) -> String {
    format!(
        "Here's where we are: {} insights gathered (about {}% of a full picture). You can ask \
         me to search partner jobs, analyze your skills, plan your transition, or start an \
         application. {}",
        state.incremental_findings.len(),
        confidence_percent(&state.incremental_findings),
        stage_question(state.workflow_state)
    )
}

fn completion_summary(state: &ConversationState) -> String {
    let mut lines = vec!["Summary of our climate career discussion:".to_string()];
    for finding in state.incremental_findings.iter().take(5) {
        lines.push(format!("- {}", finding.insight));
    }
    let overall = aggregate_confidence(&state.incremental_findings);
    lines.push(format!("Overall confidence: {:.0}%.", overall * 100.0));
    lines.push(
        "Next steps: review the opportunities we identified, consider the skill \
         recommendations, and connect with our partner organizations. You can start a new \
         conversation any time to explore further."
            .to_string(),
    );
    lines.join("\n")
}

/// AI message for a specialist response, tagged for routing transparency.
fn specialist_message(response: &AgentResponse, specialist: SpecialistKind, delegated: bool) -> Message {
    let mut message = Message::ai(response.content.clone())
        .with_attribute("specialist", serde_json::json!(specialist))
        .with_attribute("specialist_type", serde_json::json!(response.specialist_type));
    if delegated {
        message = message.with_attribute("delegated_by", serde_json::json!("pendo"));
    }
    message
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

struct InitialDiscoveryNode {
    registry: Arc<AgentRegistry>,
}

#[async_trait]
impl Node<ConversationState> for InitialDiscoveryNode {
    fn id(&self) -> &str {
        "initial_discovery"
    }

    async fn run(
        &self,
        state: ConversationState,
        _ctx: &RunContext<ConversationState>,
    ) -> Result<(ConversationUpdate, Next), CoreError> {
        let latest = state.latest_human_message().unwrap_or_default().to_string();

        if is_bare_greeting(&latest) {
            tracing::info!(message = %latest, "bare greeting, answering in one hop");
            let update = ConversationUpdate::new()
                .with_message(Message::ai(
                    "Hi there! I'm here to help you explore climate career opportunities. \
                     What interests you most?",
                ))
                .with_finding(Finding::new(
                    FindingKind::Greeting,
                    "User initiated conversation with a greeting",
                ))
                .with_stage(WorkflowStage::Completed)
                .complete()
                .bump_step(state.step_count);
            return Ok((update, Next::Continue));
        }

        let pendo = self
            .registry
            .supervisor()
            .ok_or_else(|| CoreError::Unavailable("supervisor agent".into()))?;
        let routing = pendo.assess_routing(&latest).await;
        let context = AgentContext::new(&state.user_id, &state.session_id)
            .with_history(state.conversation_history.clone());

        // Crisis turns go straight to alex and complete with escalation.
        if routing.urgency == Urgency::Crisis || routing.primary_intent == RoutingIntent::CrisisSupport
        {
            let response = pendo
                .delegate_to_specialist(&self.registry, SpecialistKind::Alex, &latest, &context)
                .await;
            let update = ConversationUpdate::new()
                .with_message(specialist_message(&response, SpecialistKind::Alex, true))
                .with_finding(
                    Finding::new(
                        FindingKind::SpecialistAnalysis,
                        first_two_sentences(&response.content),
                    )
                    .with_agent(SpecialistKind::Alex)
                    .with_confidence(response.confidence_score)
                    .with_next_actions(response.next_actions.iter().take(2).cloned().collect()),
                )
                .needs_review(true)
                .complete()
                .with_stage(WorkflowStage::Completed)
                .bump_step(state.step_count);
            return Ok((update, Next::Continue));
        }

        let discovery_finding = Finding::new(
            FindingKind::InitialDiscovery,
            format!(
                "I can see you're interested in {}",
                extract_interest_area(&latest)
            ),
        )
        .with_confidence(0.7);

        // A confidently recommended specialist answers the first turn itself.
        if let Some(kind) = routing.recommended_specialist {
            if routing.specialist_confidence >= DELEGATION_CONFIDENCE {
                let response = pendo
                    .delegate_to_specialist(&self.registry, kind, &latest, &context)
                    .await;
                let insight = first_two_sentences(&response.content);
                let update = ConversationUpdate::new()
                    .with_message(specialist_message(&response, kind, true))
                    .with_finding(discovery_finding)
                    .with_finding(
                        Finding::new(FindingKind::SpecialistAnalysis, insight.clone())
                            .with_agent(kind)
                            .with_confidence(response.confidence_score)
                            .with_sources(response.sources.clone())
                            .with_next_actions(
                                response.next_actions.iter().take(2).cloned().collect(),
                            ),
                    )
                    .with_steering_context(SteeringContext {
                        latest_insight: Some(insight),
                        suggested_next: Some(
                            "Would you like me to analyze your background for specific climate \
                             career opportunities?"
                                .to_string(),
                        ),
                        confidence: Some(response.confidence_score),
                        ..SteeringContext::default()
                    })
                    // The specialist answered the opening question; the next
                    // move is the user's, so head to steering.
                    .needs_review(true)
                    .with_stage(WorkflowStage::Analysis)
                    .bump_step(state.step_count);
                return Ok((update, Next::Continue));
            }
        }

        let response = pendo
            .handle_interaction(&latest, &state.user_id, &state.session_id, None, None)
            .await;
        let update = ConversationUpdate::new()
            .with_message(specialist_message(&response, SpecialistKind::Pendo, false))
            .with_finding(discovery_finding)
            .with_steering_context(SteeringContext {
                suggested_next: Some(
                    "Would you like me to analyze your background for specific climate career \
                     opportunities?"
                        .to_string(),
                ),
                ..SteeringContext::default()
            })
            .needs_review(!response.success)
            .with_stage(WorkflowStage::Analysis)
            .bump_step(state.step_count);
        Ok((update, Next::Continue))
    }
}

struct IncrementalAnalysisNode {
    registry: Arc<AgentRegistry>,
}

#[async_trait]
impl Node<ConversationState> for IncrementalAnalysisNode {
    fn id(&self) -> &str {
        "incremental_analysis"
    }

    async fn run(
        &self,
        state: ConversationState,
        _ctx: &RunContext<ConversationState>,
    ) -> Result<(ConversationUpdate, Next), CoreError> {
        let kind = select_analysis_specialist(&state.incremental_findings);
        let agent = self
            .registry
            .get(kind)
            .ok_or_else(|| CoreError::Unavailable(format!("specialist {kind}")))?;

        let message = state
            .latest_human_message()
            .unwrap_or("Analyze my profile for climate career opportunities")
            .to_string();
        tracing::info!(specialist = %kind, "incremental analysis");
        let response = agent
            .handle_interaction(&message, &state.user_id, &state.session_id, None, None)
            .await;

        let insight = first_two_sentences(&response.content);
        let suggested_next = response
            .next_actions
            .first()
            .map(|a| format!("Based on this analysis, would you like me to {}?", lowercase_first(a)))
            .unwrap_or_else(|| {
                "Based on this analysis, would you like me to continue exploring \
                 opportunities?"
                    .to_string()
            });

        let update = ConversationUpdate::new()
            .with_message(specialist_message(&response, kind, false))
            .with_finding(
                Finding::new(FindingKind::SpecialistAnalysis, insight.clone())
                    .with_agent(kind)
                    .with_confidence(response.confidence_score)
                    .with_sources(response.sources.clone())
                    .with_next_actions(response.next_actions.iter().take(2).cloned().collect()),
            )
            .with_steering_context(SteeringContext {
                latest_insight: Some(insight),
                confidence: Some(response.confidence_score),
                suggested_next: Some(suggested_next),
                ..SteeringContext::default()
            })
            .needs_review(!response.success)
            .with_stage(WorkflowStage::Analysis)
            .bump_step(state.step_count);
        Ok((update, Next::Continue))
    }
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

struct HumanSteeringNode;

#[async_trait]
impl Node<ConversationState> for HumanSteeringNode {
    fn id(&self) -> &str {
        "human_steering_point"
    }

    async fn run(
        &self,
        state: ConversationState,
        ctx: &RunContext<ConversationState>,
    ) -> Result<(ConversationUpdate, Next), CoreError> {
        // Steering input that arrived with this turn is processed first.
        if let Some(last) = state.messages.last() {
            if last.is_human() {
                let text = last.content.clone();
                return Ok((process_steering_input(&state, &text), Next::Continue));
            }
        }

        // A published question is still pending: suspend until the human
        // answers (the resume value), even at the steering cap.
        if state.waiting_for_input {
            let value = ctx.interrupt("human_steering_point", guidance_context(&state))?;
            let text = value
                .as_str()
                .map(String::from)
                .or_else(|| value.get("text").and_then(|t| t.as_str()).map(String::from))
                .unwrap_or_else(|| value.to_string());

            let mut update = process_steering_input(&state, &text);
            update.messages.insert(0, Message::human(text));
            return Ok((update, Next::Continue));
        }

        if state.human_steering_count >= MAX_STEERING {
            tracing::info!("max steering attempts reached, summarizing");
            let update = ConversationUpdate::new()
                .with_message(Message::ai(completion_summary(&state)))
                .complete()
                .waiting(false)
                .needs_review(false)
                .with_stage(WorkflowStage::Completed)
                .bump_step(state.step_count);
            return Ok((update, Next::Continue));
        }

        // Publish the guidance, mark the wait, count the steering attempt.
        // The router loops back here and the next pass suspends.
        let update = ConversationUpdate::new()
            .with_message(Message::ai(guidance_message(&state)))
            .with_steering_context(SteeringContext {
                message: Some(guidance_message(&state)),
                suggested_next: Some(stage_question(state.workflow_state).to_string()),
                options: vec![
                    "Search partner opportunities".to_string(),
                    "Assess your background".to_string(),
                    "Build a transition roadmap".to_string(),
                    "Start an application".to_string(),
                ],
                ..SteeringContext::default()
            })
            .waiting(true)
            .needs_review(false)
            .with_steering_count(state.human_steering_count + 1)
            .with_stage(WorkflowStage::Steering)
            .bump_step(state.step_count);
        Ok((update, Next::Continue))
    }
}

/// Acknowledges steering input and clears the wait; the router classifies the
/// text to pick the next stage.
fn process_steering_input(state: &ConversationState, text: &str) -> ConversationUpdate {
    tracing::info!(target_node = steering_target(text), "processing steering input");
    ConversationUpdate::new()
        .with_message(Message::ai(format!(
            "I understand you want to {}. Let me help you with that!",
            text.trim()
        )))
        .waiting(false)
        .needs_review(false)
        .with_stage(WorkflowStage::Analysis)
        .bump_step(state.step_count)
}

struct PartnerMatchingNode {
    partners: Arc<dyn PartnerDirectory>,
}

#[async_trait]
impl Node<ConversationState> for PartnerMatchingNode {
    fn id(&self) -> &str {
        "partner_matching"
    }

    async fn run(
        &self,
        state: ConversationState,
        _ctx: &RunContext<ConversationState>,
    ) -> Result<(ConversationUpdate, Next), CoreError> {
        let query = state
            .latest_human_message()
            .map(String::from)
            .unwrap_or_else(|| "climate careers".to_string());

        // Directory trouble degrades to an empty result, not a dead turn.
        let matches = match self.partners.find_matches(&query, 5).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(error = %e, "partner directory unavailable, matching empty");
                Vec::new()
            }
        };
        let confidence = match_confidence(&matches);

        let message = match matches.first() {
            Some(top) => format!(
                "Strong climate career matches found! Top match: {} at {} ({}), salary {}, \
                 match score {:.0}%. You can apply at {} and we'll connect you with {}.",
                top.role,
                top.organization,
                top.location,
                top.salary_range,
                top.match_score * 100.0,
                top.career_page_url,
                top.contact
            ),
            None => "I'm still searching our partner network for the best matches. Let me keep \
                     analyzing your profile while we look."
                .to_string(),
        };

        let update = ConversationUpdate::new()
            .with_message(Message::ai(message))
            .with_finding(
                Finding::new(
                    FindingKind::PartnerMatches,
                    format!("{} partner matches identified", matches.len()),
                )
                .with_confidence(confidence)
                .with_sources(vec!["Verdant partner network".to_string()]),
            )
            .with_partner_matches(matches)
            .with_stage(WorkflowStage::PartnerMatched)
            .bump_step(state.step_count);
        Ok((update, Next::Continue))
    }
}

struct ConfidenceAssessmentNode;

#[async_trait]
impl Node<ConversationState> for ConfidenceAssessmentNode {
    fn id(&self) -> &str {
        "confidence_assessment"
    }

    async fn run(
        &self,
        state: ConversationState,
        _ctx: &RunContext<ConversationState>,
    ) -> Result<(ConversationUpdate, Next), CoreError> {
        let overall = aggregate_confidence(&state.incremental_findings);
        let threshold_met = overall >= CONFIDENCE_GATE;
        tracing::info!(overall, threshold_met, "confidence assessment");

        // Carries no confidence of its own so the assessment does not feed
        // back into the aggregate it reports.
        let update = ConversationUpdate::new()
            .with_finding(Finding::new(
                FindingKind::ConfidenceAssessment,
                format!(
                    "Overall confidence {:.0}%: {}",
                    overall * 100.0,
                    if threshold_met {
                        "ready for application guidance"
                    } else {
                        "continue developing the picture"
                    }
                ),
            ))
            .with_stage(WorkflowStage::ConfidenceAssessed)
            .bump_step(state.step_count);
        Ok((update, Next::Continue))
    }
}

struct ApplicationGuidanceNode;

#[async_trait]
impl Node<ConversationState> for ApplicationGuidanceNode {
    fn id(&self) -> &str {
        "application_guidance"
    }

    async fn run(
        &self,
        state: ConversationState,
        _ctx: &RunContext<ConversationState>,
    ) -> Result<(ConversationUpdate, Next), CoreError> {
        let Some(top) = state.partner_matches.first() else {
            let update = ConversationUpdate::new()
                .with_message(Message::ai(
                    "I want to gather stronger partner matches before recommending an \
                     application. Let's keep exploring together.",
                ))
                .needs_review(true)
                .with_stage(WorkflowStage::Analysis)
                .bump_step(state.step_count);
            return Ok((update, Next::Continue));
        };

        let overall = aggregate_confidence(&state.incremental_findings);
        let update = ConversationUpdate::new()
            .with_message(Message::ai(format!(
                "You're ready to apply. Recommended: {} at {} ({}). Apply at {} and mention \
                 Verdant; {} is the contact. We'll support you through interviews.",
                top.role, top.organization, top.location, top.career_page_url, top.contact
            )))
            .with_finding(
                Finding::new(
                    FindingKind::ApplicationGuidance,
                    format!(
                        "Apply now: {} at {} via {}",
                        top.role, top.organization, top.career_page_url
                    ),
                )
                .with_confidence(overall)
                .with_next_actions(vec![
                    format!("Apply directly at {}", top.career_page_url),
                    "We'll connect you with the hiring manager for an interview".to_string(),
                ]),
            )
            .complete()
            .with_stage(WorkflowStage::ApplicationReady)
            .bump_step(state.step_count);
        Ok((update, Next::Continue))
    }
}

struct ConversationContinuationNode;

#[async_trait]
impl Node<ConversationState> for ConversationContinuationNode {
    fn id(&self) -> &str {
        "conversation_continuation"
    }

    async fn run(
        &self,
        state: ConversationState,
        _ctx: &RunContext<ConversationState>,
    ) -> Result<(ConversationUpdate, Next), CoreError> {
        let options = vec![
            "Explore more opportunities in our partner network".to_string(),
            "Get additional skill development recommendations".to_string(),
            "Connect with climate professionals in your area".to_string(),
            "Receive interview preparation guidance".to_string(),
        ];
        let menu = format!(
            "Here's what we can do next:\n- {}\nWhat would you like to explore?",
            options.join("\n- ")
        );

        let update = ConversationUpdate::new()
            .with_message(Message::ai(menu))
            .with_finding(Finding::new(
                FindingKind::ConversationContinuation,
                "Offered next-step options to continue the conversation",
            ))
            .needs_review(true)
            .with_steering_context(SteeringContext {
                message: Some("What would you like to explore next?".to_string()),
                options,
                ..SteeringContext::default()
            })
            .with_stage(WorkflowStage::Analysis)
            .bump_step(state.step_count);
        Ok((update, Next::Continue))
    }
}

// ---------------------------------------------------------------------------
// Routers
// ---------------------------------------------------------------------------

/// Global termination guards shared by every router.
fn terminal_guard(state: &ConversationState) -> Option<String> {
    if state.conversation_complete {
        return Some(END.to_string());
    }
    if state.step_count >= MAX_STEPS {
        tracing::warn!(step_count = state.step_count, "max workflow steps reached");
        return Some(END.to_string());
    }
    if state.human_steering_count >= MAX_STEERING && !state.waiting_for_input {
        tracing::warn!("max steering attempts reached");
        return Some(END.to_string());
    }
    None
}

fn route_initial_discovery(state: &ConversationState) -> String {
    if let Some(end) = terminal_guard(state) {
        return end;
    }
    if state.needs_human_review {
        return "human_steering_point".to_string();
    }
    "incremental_analysis".to_string()
}

fn route_after_analysis(state: &ConversationState) -> String {
    if let Some(end) = terminal_guard(state) {
        return end;
    }
    if state.needs_human_review {
        return "human_steering_point".to_string();
    }
    if state.incremental_findings.len() >= 3 {
        "partner_matching".to_string()
    } else {
        "confidence_assessment".to_string()
    }
}

fn route_after_partner_matching(state: &ConversationState) -> String {
    if let Some(end) = terminal_guard(state) {
        return end;
    }
    if state.needs_human_review {
        return "human_steering_point".to_string();
    }
    "confidence_assessment".to_string()
}

fn route_after_confidence(state: &ConversationState) -> String {
    if let Some(end) = terminal_guard(state) {
        return end;
    }
    let overall = aggregate_confidence(&state.incremental_findings);
    if overall >= CONFIDENCE_GATE {
        if state.partner_matches.is_empty() {
            "partner_matching".to_string()
        } else {
            "application_guidance".to_string()
        }
    } else {
        "conversation_continuation".to_string()
    }
}

fn route_after_application(state: &ConversationState) -> String {
    if state.conversation_complete {
        return END.to_string();
    }
    if let Some(end) = terminal_guard(state) {
        return end;
    }
    "conversation_continuation".to_string()
}

fn route_after_steering(state: &ConversationState) -> String {
    if let Some(end) = terminal_guard(state) {
        return end;
    }
    if state.waiting_for_input {
        // Guidance published, still no human input: re-enter to suspend.
        match state.messages.last() {
            Some(m) if m.is_human() => {}
            _ => return "human_steering_point".to_string(),
        }
    }
    match state.latest_human_message() {
        Some(text) => steering_target(text).to_string(),
        None => "incremental_analysis".to_string(),
    }
}

fn route_after_continuation(state: &ConversationState) -> String {
    if let Some(end) = terminal_guard(state) {
        return end;
    }
    if state.needs_human_review {
        "human_steering_point".to_string()
    } else {
        "incremental_analysis".to_string()
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// The compiled supervisor graph.
pub struct SupervisorWorkflow {
    graph: CompiledStateGraph<ConversationState>,
}

impl SupervisorWorkflow {
    pub fn new(
        registry: Arc<AgentRegistry>,
        partners: Arc<dyn PartnerDirectory>,
        checkpointer: Arc<dyn Checkpointer<ConversationState>>,
    ) -> Result<Self, CompilationError> {
        let mut graph = StateGraph::new();
        graph.add_node(
            "initial_discovery",
            Arc::new(InitialDiscoveryNode {
                registry: registry.clone(),
            }),
        );
        graph.add_node(
            "incremental_analysis",
            Arc::new(IncrementalAnalysisNode { registry }),
        );
        graph.add_node("human_steering_point", Arc::new(HumanSteeringNode));
        graph.add_node("partner_matching", Arc::new(PartnerMatchingNode { partners }));
        graph.add_node("confidence_assessment", Arc::new(ConfidenceAssessmentNode));
        graph.add_node("application_guidance", Arc::new(ApplicationGuidanceNode));
        graph.add_node(
            "conversation_continuation",
            Arc::new(ConversationContinuationNode),
        );

        graph.add_edge(START, "initial_discovery");
        graph.add_conditional_edges("initial_discovery", Arc::new(route_initial_discovery), None);
        graph.add_conditional_edges("incremental_analysis", Arc::new(route_after_analysis), None);
        graph.add_conditional_edges(
            "partner_matching",
            Arc::new(route_after_partner_matching),
            None,
        );
        graph.add_conditional_edges(
            "confidence_assessment",
            Arc::new(route_after_confidence),
            None,
        );
        graph.add_conditional_edges(
            "application_guidance",
            Arc::new(route_after_application),
            None,
        );
        graph.add_conditional_edges("human_steering_point", Arc::new(route_after_steering), None);
        graph.add_conditional_edges(
            "conversation_continuation",
            Arc::new(route_after_continuation),
            None,
        );

        Ok(Self {
            graph: graph.compile_with_checkpointer(checkpointer)?,
        })
    }

    /// Runs one turn to termination or suspension.
    pub async fn invoke(
        &self,
        state: ConversationState,
        config: Option<RunnableConfig>,
    ) -> Result<ConversationState, CoreError> {
        self.graph.invoke(state, config).await
    }

    /// Streams one turn as per-node events.
    pub fn stream(
        &self,
        state: ConversationState,
        config: Option<RunnableConfig>,
        modes: impl IntoIterator<Item = StreamMode>,
    ) -> tokio_stream::wrappers::ReceiverStream<StreamEvent<ConversationState>> {
        self.graph.stream(state, config, modes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: greeting matching is full-string, trimmed,
    /// case-insensitive, and never fires on substrings.
    #[test]
    fn bare_greeting_matching() {
        assert!(is_bare_greeting("hello"));
        assert!(is_bare_greeting("  HEY  "));
        assert!(is_bare_greeting("Sup"));
        assert!(!is_bare_greeting("hello there"));
        assert!(!is_bare_greeting("hip"));
        assert!(!is_bare_greeting(""));
        assert!(!is_bare_greeting("say hello"));
    }

    /// **Scenario**: steering keywords map to the documented targets.
    #[test]
    fn steering_targets() {
        assert_eq!(steering_target("find me jobs"), "partner_matching");
        assert_eq!(steering_target("please analyze my skills"), "incremental_analysis");
        assert_eq!(steering_target("I need a plan and roadmap"), "confidence_assessment");
        assert_eq!(steering_target("help me apply and network"), "application_guidance");
        assert_eq!(steering_target("hmm not sure"), "incremental_analysis");
    }

    /// **Scenario**: the analysis rotation follows mai → lauren → marcus →
    /// lauren, with mai after plain discovery.
    #[test]
    fn analysis_specialist_rotation() {
        assert_eq!(select_analysis_specialist(&[]), SpecialistKind::Mai);

        let discovery = Finding::new(FindingKind::InitialDiscovery, "x");
        assert_eq!(select_analysis_specialist(&[discovery]), SpecialistKind::Mai);

        let from = |kind| {
            Finding::new(FindingKind::SpecialistAnalysis, "x").with_agent(kind)
        };
        assert_eq!(
            select_analysis_specialist(&[from(SpecialistKind::Mai)]),
            SpecialistKind::Lauren
        );
        assert_eq!(
            select_analysis_specialist(&[from(SpecialistKind::Lauren)]),
            SpecialistKind::Marcus
        );
        assert_eq!(
            select_analysis_specialist(&[from(SpecialistKind::Marcus)]),
            SpecialistKind::Lauren
        );
    }

    /// **Scenario**: key-insight extraction takes the first two sentences.
    #[test]
    fn key_insight_two_sentences() {
        let content = "First point here. Second point there. Third is dropped.";
        assert_eq!(first_two_sentences(content), "First point here. Second point there.");
        assert_eq!(first_two_sentences("No terminal punctuation"), "No terminal punctuation.");
    }

    /// **Scenario**: routers honor the three global termination guards.
    #[test]
    fn routers_honor_termination_guards() {
        let mut state = ConversationState::default();
        state.conversation_complete = true;
        assert_eq!(route_initial_discovery(&state), END);

        let mut state = ConversationState::default();
        state.step_count = MAX_STEPS;
        assert_eq!(route_after_analysis(&state), END);

        let mut state = ConversationState::default();
        state.human_steering_count = MAX_STEERING;
        assert_eq!(route_after_continuation(&state), END);
    }

    /// **Scenario**: the confidence router applies the 0.8 gate, detouring to
    /// partner matching when no matches exist yet.
    #[test]
    fn confidence_gate_routing() {
        let mut state = ConversationState::default();
        for c in [0.9, 0.85, 0.8] {
            state.incremental_findings.push(
                Finding::new(FindingKind::SpecialistAnalysis, "x").with_confidence(c),
            );
        }
        assert_eq!(route_after_confidence(&state), "partner_matching");

        state.partner_matches =
            super::super::partners::StaticPartnerDirectory::sample_matches();
        assert_eq!(route_after_confidence(&state), "application_guidance");

        let mut low = ConversationState::default();
        low.incremental_findings.push(
            Finding::new(FindingKind::SpecialistAnalysis, "x").with_confidence(0.4),
        );
        assert_eq!(route_after_confidence(&low), "conversation_continuation");
    }

    /// **Scenario**: display confidence percent grows with findings, capped at 90.
    #[test]
    fn confidence_percent_capped() {
        assert_eq!(confidence_percent(&[]), 10);
        let findings: Vec<Finding> = (0..6)
            .map(|_| Finding::new(FindingKind::SpecialistAnalysis, "x"))
            .collect();
        assert_eq!(confidence_percent(&findings), 90);
    }
}
