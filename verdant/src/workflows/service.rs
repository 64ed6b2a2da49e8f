//! Conversation service: one object the transport talks to.
//!
//! Owns the compiled supervisor workflow, the checkpointer, the session
//! tracker, and the workflow-session store. Each turn: load or build state,
//! run (or resume) the graph, persist messages and counters, and shape the
//! caller-facing response with routing transparency.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::agents::{AgentRegistry, SpecialistKind};
use crate::error::CoreError;
use crate::graph::{CompilationError, GraphState};
use crate::memory::{Checkpointer, MemorySaver, RunnableConfig};
use crate::message::Message;
use crate::session::{new_session_record, validate_record, SessionState, SessionStore, SessionTracker};
use crate::state::ConversationState;
use crate::stream::{StreamEvent, StreamMode};
use crate::workflows::{PartnerDirectory, SupervisorWorkflow};

/// Routing transparency for one turn.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingInfo {
    pub recommended_specialist: Option<SpecialistKind>,
    pub delegated: bool,
}

/// Caller-facing summary of a turn, shaped like an agent response.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub content: String,
    pub specialist_type: String,
    pub confidence_score: f32,
    pub next_actions: Vec<String>,
    pub sources: Vec<String>,
    pub success: bool,
    pub routing_info: RoutingInfo,
}

/// Full result of one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub state: ConversationState,
    pub response: TurnResponse,
    /// Present when the turn suspended awaiting human steering; carries the
    /// surfaced guidance context.
    pub interrupted: Option<serde_json::Value>,
}

pub struct ConversationService {
    workflow: SupervisorWorkflow,
    checkpointer: Arc<MemorySaver<ConversationState>>,
    tracker: SessionTracker,
    sessions: Arc<dyn SessionStore>,
    llm_configured: bool,
}

impl ConversationService {
    pub fn new(
        registry: Arc<AgentRegistry>,
        partners: Arc<dyn PartnerDirectory>,
        sessions: Arc<dyn SessionStore>,
        llm_configured: bool,
    ) -> Result<Self, CompilationError> {
        let checkpointer = Arc::new(MemorySaver::new());
        let workflow = SupervisorWorkflow::new(registry, partners, checkpointer.clone())?;
        Ok(Self {
            workflow,
            checkpointer,
            tracker: SessionTracker::new(),
            sessions,
            llm_configured,
        })
    }

    /// Builds the state and config for a turn: resume into a suspended
    /// steering point when one is pending, otherwise start fresh with the
    /// tracked history.
    async fn turn_input(
        &self,
        user_id: &str,
        conversation_id: &str,
        content: &str,
        deadline: Option<Duration>,
    ) -> Result<(ConversationState, RunnableConfig), CoreError> {
        let mut config = RunnableConfig::for_thread(conversation_id);
        config.user_id = Some(user_id.to_string());
        if let Some(d) = deadline {
            config = config.with_deadline(d);
        }

        let checkpoint = self
            .checkpointer
            .get(&config)
            .await
            .map_err(|e| CoreError::Unavailable(format!("checkpoint store: {e}")))?;

        // Resume only a true suspension: a checkpoint taken at an interrupt
        // names the node to re-enter. Anything else starts a new execution
        // (fresh counters), seeded with the tracked history.
        if let Some(cp) = checkpoint {
            if let Some(node) = cp.suspended_node.clone() {
                let state = cp.state;
                if !state.conversation_complete && state.waiting_for_input {
                    let mut state = state;
                    state.apply(
                        crate::state::ConversationUpdate::new()
                            .with_message(Message::human(content)),
                    );
                    config.resume_from_node_id = Some(node);
                    return Ok((state, config));
                }
            }
        }

        let history = self.tracker.history(user_id, conversation_id);
        Ok((
            ConversationState::for_turn(user_id, conversation_id, Message::human(content), history),
            config,
        ))
    }

    /// Runs one non-streaming turn.
    pub async fn handle_message(
        &self,
        user_id: &str,
        conversation_id: &str,
        content: &str,
        deadline: Option<Duration>,
    ) -> Result<TurnOutcome, CoreError> {
        if content.trim().is_empty() {
            return Err(CoreError::InvalidInput("message cannot be empty".into()));
        }

        let (state, config) = self
            .turn_input(user_id, conversation_id, content, deadline)
            .await?;

        let (final_state, interrupted) = match self.workflow.invoke(state, Some(config.clone())).await
        {
            Ok(s) => (s, None),
            Err(CoreError::Interrupted(gi)) => {
                // The engine checkpointed at suspension; that snapshot is the
                // turn's visible state.
                let cp = self
                    .checkpointer
                    .get(&config)
                    .await
                    .map_err(|e| CoreError::Unavailable(format!("checkpoint store: {e}")))?
                    .ok_or_else(|| {
                        CoreError::InternalInvariant("interrupt without checkpoint".into())
                    })?;
                (cp.state, Some(gi.0.value))
            }
            Err(e) => return Err(e),
        };

        self.record_turn(user_id, conversation_id, &final_state).await;

        let response = build_turn_response(&final_state);
        Ok(TurnOutcome {
            state: final_state,
            response,
            interrupted,
        })
    }

    /// Runs one streaming turn: per-node updates, messages, and interrupts.
    pub async fn stream_message(
        &self,
        user_id: &str,
        conversation_id: &str,
        content: &str,
    ) -> Result<tokio_stream::wrappers::ReceiverStream<StreamEvent<ConversationState>>, CoreError>
    {
        if content.trim().is_empty() {
            return Err(CoreError::InvalidInput("message cannot be empty".into()));
        }
        let (state, config) = self
            .turn_input(user_id, conversation_id, content, None)
            .await?;
        Ok(self
            .workflow
            .stream(state, Some(config), StreamMode::transport_default()))
    }

    async fn record_turn(&self, user_id: &str, conversation_id: &str, state: &ConversationState) {
        let specialists = state
            .incremental_findings
            .iter()
            .filter_map(|f| f.agent)
            .collect::<Vec<_>>();
        self.tracker.record_turn(
            user_id,
            conversation_id,
            &state.messages,
            &specialists,
            state.conversation_complete,
        );

        let record = new_session_record(conversation_id, user_id);
        match self.sessions.get(conversation_id).await {
            Ok(Some(existing)) => {
                if validate_record(&existing) == SessionState::Expired {
                    tracing::info!(conversation_id, "workflow session expired, recreating");
                    if let Err(e) = self.sessions.create(&record).await {
                        tracing::warn!(error = %e, "session recreate failed");
                    }
                } else if let Err(e) = self.sessions.touch(conversation_id).await {
                    tracing::warn!(error = %e, "session touch failed");
                }
            }
            Ok(None) => {
                if let Err(e) = self.sessions.create(&record).await {
                    tracing::warn!(error = %e, "session create failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "session lookup failed"),
        }
    }

    /// Tracked message history for a conversation.
    pub fn history(&self, user_id: &str, conversation_id: &str) -> Vec<Message> {
        self.tracker.history(user_id, conversation_id)
    }

    /// One-paragraph summary of a conversation from its findings.
    pub fn summary(&self, user_id: &str, conversation_id: &str) -> Option<String> {
        let history = self.tracker.history(user_id, conversation_id);
        if history.is_empty() {
            return None;
        }
        let ai_turns = history.iter().filter(|m| m.is_ai()).count();
        let human_turns = history.iter().filter(|m| m.is_human()).count();
        Some(format!(
            "{human_turns} user turns and {ai_turns} assistant replies in this conversation."
        ))
    }

    pub fn conversations(&self, user_id: &str) -> Vec<String> {
        self.tracker.conversations(user_id)
    }

    pub fn delete_conversation(&self, user_id: &str, conversation_id: &str) -> bool {
        self.tracker.delete(user_id, conversation_id)
    }

    pub fn stats(&self, user_id: &str) -> serde_json::Value {
        self.tracker.stats(user_id)
    }

    /// Component reachability for health endpoints.
    pub async fn health(&self) -> serde_json::Value {
        let store_ok = self.sessions.get("__health_probe__").await.is_ok();
        serde_json::json!({
            "llm_configured": self.llm_configured,
            "session_store": store_ok,
            "tracker_conversations": self.tracker.len(),
        })
    }
}

/// Shapes the caller-facing response from the final state.
fn build_turn_response(state: &ConversationState) -> TurnResponse {
    let last_ai = state.messages.iter().rev().find(|m| m.is_ai());

    let content = last_ai
        .map(|m| m.content.clone())
        .unwrap_or_else(|| {
            "I'm here to help you explore climate career opportunities. Tell me a bit about \
             your background to get started."
                .to_string()
        });

    // The most recent specialist-tagged reply names the turn's specialist;
    // untagged engine messages (guidance, summaries) don't override it.
    let specialist_type = state
        .messages
        .iter()
        .rev()
        .find_map(|m| {
            m.attributes
                .get("specialist_type")
                .and_then(|v| v.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| "supervisor".to_string());

    let recommended_specialist = state
        .incremental_findings
        .iter()
        .rev()
        .find_map(|f| f.agent);
    let delegated = state
        .messages
        .iter()
        .any(|m| m.attributes.contains_key("delegated_by"));

    let mut next_actions: Vec<String> = state
        .incremental_findings
        .last()
        .map(|f| f.next_actions.clone())
        .unwrap_or_default();
    if next_actions.is_empty() {
        if let Some(ctx) = &state.human_steering_context {
            next_actions = ctx.options.clone();
        }
    }
    if next_actions.is_empty() {
        next_actions.push("Tell me more about your background and interests".to_string());
    }

    let sources = state
        .incremental_findings
        .last()
        .map(|f| f.sources.clone())
        .unwrap_or_default();

    TurnResponse {
        content,
        specialist_type,
        confidence_score: state.overall_confidence(),
        next_actions,
        sources,
        success: state.workflow_state != crate::state::WorkflowStage::Error,
        routing_info: RoutingInfo {
            recommended_specialist,
            delegated,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;
    use crate::prompts::PromptRegistry;
    use crate::session::InMemorySessionStore;
    use crate::workflows::StaticPartnerDirectory;

    fn service_with(llm: MockLlm) -> ConversationService {
        let prompts = Arc::new(PromptRegistry::from_embedded().unwrap());
        let registry = Arc::new(AgentRegistry::build(Arc::new(llm), prompts).unwrap());
        ConversationService::new(
            registry,
            Arc::new(StaticPartnerDirectory::sample()),
            Arc::new(InMemorySessionStore::new()),
            false,
        )
        .unwrap()
    }

    /// **Scenario**: an empty message is rejected with InvalidInput.
    #[tokio::test]
    async fn empty_message_rejected() {
        let service = service_with(MockLlm::new());
        let r = service.handle_message("u1", "c1", "   ", None).await;
        assert!(matches!(r, Err(CoreError::InvalidInput(_))));
    }

    /// **Scenario**: a bare greeting completes in one turn and the response
    /// mentions climate careers.
    #[tokio::test]
    async fn greeting_turn_completes() {
        let service = service_with(MockLlm::new());
        let outcome = service.handle_message("u1", "c1", "hello", None).await.unwrap();
        assert!(outcome.state.conversation_complete);
        assert!(outcome
            .response
            .content
            .to_lowercase()
            .contains("climate career"));
        assert!(outcome.interrupted.is_none());
        assert!(!outcome.response.next_actions.is_empty());
    }

    /// **Scenario**: history accumulates through the tracker per conversation.
    #[tokio::test]
    async fn history_tracked_per_conversation() {
        let service = service_with(MockLlm::new());
        service.handle_message("u1", "c1", "hello", None).await.unwrap();
        let history = service.history("u1", "c1");
        assert!(history.iter().any(|m| m.is_human() && m.content == "hello"));
        assert!(history.iter().any(|m| m.is_ai()));
        assert_eq!(service.conversations("u1"), vec!["c1".to_string()]);
        assert!(service.history("u1", "other").is_empty());
    }
}
