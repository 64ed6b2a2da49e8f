//! Compiled state graph: immutable, supports invoke and stream.
//!
//! Built by `StateGraph::compile` or `compile_with_checkpointer`. Holds nodes
//! and routing tables; when a checkpointer is set and the config carries a
//! `thread_id`, state is saved on interrupt and at termination so a suspended
//! conversation can resume in a later request.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::CoreError;
use crate::memory::{Checkpoint, Checkpointer, RunnableConfig};
use crate::stream::{StreamEvent, StreamMode};

use super::logging::{log_graph_complete, log_graph_start, log_node_complete, log_node_start};
use super::state_graph::END;
use super::{GraphState, Next, NextEntry, Node, RunContext};

/// Immutable, runnable graph.
///
/// Node errors do not abort with `Err`: the run loop merges
/// [`GraphState::error_delta`] (flagging human review) and terminates, per the
/// engine's failure semantics. Only an interrupt surfaces as `Err`, carrying
/// the suspension context.
#[derive(Clone)]
pub struct CompiledStateGraph<S: GraphState> {
    pub(super) nodes: HashMap<String, Arc<dyn Node<S>>>,
    pub(super) first_node_id: String,
    /// Node insertion order; used for `Next::Continue` when a node has no
    /// explicit successor.
    pub(super) node_order: Vec<String>,
    pub(super) next_map: HashMap<String, NextEntry<S>>,
    pub(super) checkpointer: Option<Arc<dyn Checkpointer<S>>>,
    pub(super) max_steps: usize,
}

impl<S: GraphState> std::fmt::Debug for CompiledStateGraph<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledStateGraph")
            .field("first_node_id", &self.first_node_id)
            .field("node_order", &self.node_order)
            .field("max_steps", &self.max_steps)
            .finish_non_exhaustive()
    }
}

impl<S: GraphState> CompiledStateGraph<S> {
    async fn save_checkpoint(
        &self,
        state: &S,
        config: &RunnableConfig,
        step: u32,
        suspended_node: Option<&str>,
    ) {
        if let Some(cp) = &self.checkpointer {
            if config.thread_id.is_some() {
                let checkpoint =
                    Checkpoint::from_state(state.clone(), step, suspended_node.map(String::from));
                if let Err(e) = cp.put(config, &checkpoint).await {
                    tracing::warn!(error = %e, "checkpoint save failed");
                }
            }
        }
    }

    async fn emit(&self, ctx: &RunContext<S>, mode: StreamMode, event: StreamEvent<S>) {
        if let Some(tx) = &ctx.stream_tx {
            if ctx.stream_mode.contains(&mode) {
                let _ = tx.send(event).await;
            }
        }
    }

    /// Shared run loop used by invoke() and stream(): steps through nodes
    /// until termination or suspension. Each node's delta is applied
    /// atomically before routing.
    async fn run_loop(
        &self,
        state: &mut S,
        current_id: &mut String,
        ctx: &RunContext<S>,
    ) -> Result<(), CoreError> {
        log_graph_start();
        let mut steps: u32 = 0;

        loop {
            steps += 1;
            if steps as usize > self.max_steps {
                // Backstop for mis-built graphs; workflow-level counters bound
                // well-formed runs long before this fires.
                tracing::error!(steps, "engine step budget exhausted");
                state.apply(S::error_delta("engine step budget exhausted"));
                self.save_checkpoint(state, &ctx.config, steps, None).await;
                return Ok(());
            }

            let node = self
                .nodes
                .get(current_id.as_str())
                .ok_or_else(|| {
                    CoreError::InternalInvariant(format!("unknown node {current_id}"))
                })?
                .clone();

            log_node_start(current_id);
            self.emit(
                ctx,
                StreamMode::Tasks,
                StreamEvent::TaskStart {
                    node_id: current_id.clone(),
                },
            )
            .await;

            let (delta, next) = match node.run(state.clone(), ctx).await {
                Ok(output) => output,
                Err(CoreError::Interrupted(interrupt)) => {
                    // Suspension, not failure: checkpoint what we have so the
                    // turn can resume into this node, then surface the context.
                    self.save_checkpoint(state, &ctx.config, steps, Some(current_id))
                        .await;
                    self.emit(
                        ctx,
                        StreamMode::Interrupts,
                        StreamEvent::Interrupted {
                            node_id: current_id.clone(),
                            value: interrupt.0.value.clone(),
                        },
                    )
                    .await;
                    tracing::info!(node_id = %current_id, "graph suspended for human input");
                    return Err(CoreError::Interrupted(interrupt));
                }
                Err(e) => {
                    tracing::error!(node_id = %current_id, error = %e, "node failed");
                    self.emit(
                        ctx,
                        StreamMode::Tasks,
                        StreamEvent::TaskEnd {
                            node_id: current_id.clone(),
                            result: Err(e.to_string()),
                        },
                    )
                    .await;
                    state.apply(S::error_delta(&e.to_string()));
                    self.save_checkpoint(state, &ctx.config, steps, None).await;
                    return Ok(());
                }
            };

            state.apply(delta);
            log_node_complete(current_id, &next);

            self.emit(
                ctx,
                StreamMode::Tasks,
                StreamEvent::TaskEnd {
                    node_id: current_id.clone(),
                    result: Ok(()),
                },
            )
            .await;
            self.emit(ctx, StreamMode::Values, StreamEvent::Values(state.clone()))
                .await;
            self.emit(
                ctx,
                StreamMode::Updates,
                StreamEvent::Updates {
                    node_id: current_id.clone(),
                    state: state.clone(),
                },
            )
            .await;

            let next_id: Option<String> =
                if let Some(NextEntry::Conditional(router)) = self.next_map.get(current_id.as_str())
                {
                    let target = router.resolve_next(state);
                    tracing::debug!(from = %current_id, to = %target, "conditional routing");
                    Some(target)
                } else {
                    match next {
                        Next::End => None,
                        Next::Node(id) => Some(id),
                        Next::Continue => self
                            .next_map
                            .get(current_id.as_str())
                            .and_then(|e| match e {
                                NextEntry::Unconditional(id) => Some(id.clone()),
                                NextEntry::Conditional(_) => None,
                            })
                            .or_else(|| {
                                let pos =
                                    self.node_order.iter().position(|x| x == current_id)?;
                                self.node_order.get(pos + 1).cloned()
                            }),
                    }
                };

            match next_id {
                None => {
                    self.save_checkpoint(state, &ctx.config, steps, None).await;
                    log_graph_complete();
                    return Ok(());
                }
                Some(id) if id == END => {
                    self.save_checkpoint(state, &ctx.config, steps, None).await;
                    log_graph_complete();
                    return Ok(());
                }
                Some(id) => *current_id = id,
            }
        }
    }

    fn start_node(&self, config: &RunnableConfig) -> String {
        config
            .resume_from_node_id
            .as_ref()
            .filter(|id| self.nodes.contains_key(id.as_str()))
            .cloned()
            .unwrap_or_else(|| self.first_node_id.clone())
    }

    /// Runs the graph to termination or suspension and returns the merged
    /// state. On suspension returns `Err(CoreError::Interrupted)`; the
    /// checkpoint (when configured) holds the state for resume.
    pub async fn invoke(&self, state: S, config: Option<RunnableConfig>) -> Result<S, CoreError> {
        let config = config.unwrap_or_default();
        let mut current_id = self.start_node(&config);
        let ctx = RunContext::new(config);
        let mut state = state;
        self.run_loop(&mut state, &mut current_id, &ctx).await?;
        Ok(state)
    }

    /// Streams graph execution, emitting per-node events as they complete.
    /// The stream ends when the run terminates or suspends.
    pub fn stream(
        &self,
        state: S,
        config: Option<RunnableConfig>,
        stream_mode: impl IntoIterator<Item = StreamMode>,
    ) -> ReceiverStream<StreamEvent<S>> {
        let (tx, rx) = mpsc::channel(128);
        let graph = self.clone();
        let config = config.unwrap_or_default();
        let modes: std::collections::HashSet<StreamMode> = stream_mode.into_iter().collect();

        tokio::spawn(async move {
            let mut current_id = graph.start_node(&config);
            let mut ctx = RunContext::new(config);
            ctx.stream_tx = Some(tx);
            ctx.stream_mode = modes;
            let mut state = state;
            let _ = graph.run_loop(&mut state, &mut current_id, &ctx).await;
        });

        ReceiverStream::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{StateGraph, START};
    use crate::memory::MemorySaver;
    use crate::message::Message;
    use crate::state::{ConversationState, ConversationUpdate};
    use async_trait::async_trait;
    use tokio_stream::StreamExt;

    /// Node that appends one AI message (fresh id per call).
    struct SayNode {
        id: &'static str,
        text: &'static str,
    }

    #[async_trait]
    impl Node<ConversationState> for SayNode {
        fn id(&self) -> &str {
            self.id
        }
        async fn run(
            &self,
            state: ConversationState,
            _ctx: &RunContext<ConversationState>,
        ) -> Result<(ConversationUpdate, Next), CoreError> {
            let update = ConversationUpdate::new()
                .with_message(Message::ai(self.text))
                .bump_step(state.step_count);
            Ok((update, Next::Continue))
        }
    }

    /// Node that fails with an execution error.
    struct FailingNode;

    #[async_trait]
    impl Node<ConversationState> for FailingNode {
        fn id(&self) -> &str {
            "failing"
        }
        async fn run(
            &self,
            _state: ConversationState,
            _ctx: &RunContext<ConversationState>,
        ) -> Result<(ConversationUpdate, Next), CoreError> {
            Err(CoreError::Unavailable("partner database".into()))
        }
    }

    /// Node that interrupts until resumed, then appends the human answer.
    struct AskNode;

    #[async_trait]
    impl Node<ConversationState> for AskNode {
        fn id(&self) -> &str {
            "ask"
        }
        async fn run(
            &self,
            state: ConversationState,
            ctx: &RunContext<ConversationState>,
        ) -> Result<(ConversationUpdate, Next), CoreError> {
            let answer = ctx.interrupt("ask", serde_json::json!({"question": "more detail?"}))?;
            let update = ConversationUpdate::new()
                .with_message(Message::ai(format!("you said: {answer}")))
                .bump_step(state.step_count);
            Ok((update, Next::Continue))
        }
    }

    fn two_say_graph() -> CompiledStateGraph<ConversationState> {
        let mut graph = StateGraph::new();
        graph.add_node("first", Arc::new(SayNode { id: "first", text: "one" }));
        graph.add_node("second", Arc::new(SayNode { id: "second", text: "two" }));
        graph.add_edge(START, "first");
        graph.add_edge("first", "second");
        graph.add_edge("second", END);
        graph.compile().expect("graph compiles")
    }

    /// **Scenario**: messages accumulate in graph order across two nodes.
    #[tokio::test]
    async fn invoke_appends_messages_in_graph_order() {
        let graph = two_say_graph();
        let initial = ConversationState::for_turn("u", "s", Message::human("hi"), vec![]);
        let out = graph.invoke(initial, None).await.unwrap();
        let contents: Vec<&str> = out.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "one", "two"]);
        assert_eq!(out.step_count, 2);
    }

    /// **Scenario**: a failing node merges the error delta (review flagged)
    /// and the run terminates Ok rather than propagating the error.
    #[tokio::test]
    async fn invoke_node_error_flags_review_and_terminates() {
        let mut graph = StateGraph::new();
        graph.add_node("failing", Arc::new(FailingNode));
        graph.add_edge(START, "failing");
        graph.add_edge("failing", END);
        let compiled = graph.compile().unwrap();

        let out = compiled
            .invoke(ConversationState::default(), None)
            .await
            .expect("node error terminates the run, not the call");
        assert!(out.needs_human_review);
        assert!(out.messages.iter().any(|m| m.is_ai()));
    }

    /// **Scenario**: interrupt suspends with a checkpoint; resuming with the
    /// human value re-enters the same node and no message is lost or duplicated.
    #[tokio::test]
    async fn interrupt_checkpoints_and_resumes_without_message_loss() {
        let saver = Arc::new(MemorySaver::<ConversationState>::new());
        let mut graph = StateGraph::new();
        graph.add_node("first", Arc::new(SayNode { id: "first", text: "pre" }));
        graph.add_node("ask", Arc::new(AskNode));
        graph.add_edge(START, "first");
        graph.add_edge("first", "ask");
        graph.add_edge("ask", END);
        let compiled = graph.compile_with_checkpointer(saver.clone()).unwrap();

        let config = RunnableConfig {
            thread_id: Some("t1".into()),
            ..Default::default()
        };
        let initial = ConversationState::for_turn("u", "s", Message::human("hi"), vec![]);
        let err = compiled
            .invoke(initial, Some(config.clone()))
            .await
            .unwrap_err();
        let suspended_at = match err {
            CoreError::Interrupted(gi) => gi.0.node_id,
            other => panic!("expected interrupt, got {other:?}"),
        };
        assert_eq!(suspended_at, "ask");

        let checkpoint = saver.get(&config).await.unwrap().expect("checkpoint saved");
        assert_eq!(checkpoint.suspended_node.as_deref(), Some("ask"));
        // "pre" was merged before the suspension.
        assert!(checkpoint.state.messages.iter().any(|m| m.content == "pre"));

        let resume_config = RunnableConfig {
            thread_id: Some("t1".into()),
            resume_from_node_id: Some("ask".into()),
            resume_value: Some(serde_json::json!("go deeper")),
            ..Default::default()
        };
        let resumed = compiled
            .invoke(checkpoint.state, Some(resume_config))
            .await
            .unwrap();

        let pre_count = resumed.messages.iter().filter(|m| m.content == "pre").count();
        assert_eq!(pre_count, 1, "no duplicate across suspend/resume");
        assert!(resumed
            .messages
            .iter()
            .any(|m| m.content.contains("go deeper")));
    }

    /// **Scenario**: stream(updates) yields one Updates event per node, in order.
    #[tokio::test]
    async fn stream_updates_in_node_order() {
        let graph = two_say_graph();
        let initial = ConversationState::for_turn("u", "s", Message::human("hi"), vec![]);
        let events: Vec<_> = graph
            .stream(initial, None, [StreamMode::Updates])
            .collect()
            .await;
        let ids: Vec<String> = events
            .iter()
            .map(|e| match e {
                StreamEvent::Updates { node_id, .. } => node_id.clone(),
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec!["first".to_string(), "second".to_string()]);
    }

    /// **Scenario**: stream with Interrupts mode surfaces the suspension context.
    #[tokio::test]
    async fn stream_surfaces_interrupt_event() {
        let mut graph = StateGraph::new();
        graph.add_node("ask", Arc::new(AskNode));
        graph.add_edge(START, "ask");
        graph.add_edge("ask", END);
        let compiled = graph.compile().unwrap();

        let events: Vec<_> = compiled
            .stream(
                ConversationState::default(),
                None,
                [StreamMode::Interrupts],
            )
            .collect()
            .await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Interrupted { node_id, value } => {
                assert_eq!(node_id, "ask");
                assert_eq!(value["question"], "more detail?");
            }
            other => panic!("expected Interrupted, got {other:?}"),
        }
    }

    /// **Scenario**: a two-node cycle without termination trips the engine
    /// step budget and ends with the error delta, not a hang.
    #[tokio::test]
    async fn run_loop_step_budget_backstop() {
        struct LoopNode(&'static str, &'static str);

        #[async_trait]
        impl Node<ConversationState> for LoopNode {
            fn id(&self) -> &str {
                self.0
            }
            async fn run(
                &self,
                _state: ConversationState,
                _ctx: &RunContext<ConversationState>,
            ) -> Result<(ConversationUpdate, Next), CoreError> {
                Ok((ConversationUpdate::new(), Next::Node(self.1.to_string())))
            }
        }

        let mut graph = StateGraph::new().with_max_steps(6);
        graph.add_node("a", Arc::new(LoopNode("a", "b")));
        graph.add_node("b", Arc::new(LoopNode("b", "a")));
        graph.add_edge(START, "a");
        let compiled = graph.compile().unwrap();

        let out = compiled.invoke(ConversationState::default(), None).await.unwrap();
        assert!(out.needs_human_review, "budget exhaustion flags review");
    }
}
