//! Run context passed into nodes: config, streaming, and the interrupt/resume
//! handshake.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::CoreError;
use crate::memory::RunnableConfig;
use crate::stream::{MessageChunk, StreamEvent, StreamMode};

use super::{GraphInterrupt, GraphState, Interrupt};

/// Per-run context handed to every node.
///
/// Carries the runnable config (thread id, deadline, resume target), the
/// optional stream sender with its enabled modes, and the one-shot resume
/// value consumed by [`RunContext::interrupt`].
#[derive(Clone)]
pub struct RunContext<S: GraphState> {
    /// Config for the current run (thread_id, deadline, resume fields).
    pub config: RunnableConfig,
    /// Optional sender for streaming events.
    pub stream_tx: Option<mpsc::Sender<StreamEvent<S>>>,
    /// Enabled stream modes.
    pub stream_mode: HashSet<StreamMode>,
    /// Resume value, consumed by the first `interrupt` call in the resumed
    /// node. Shared so the context stays cheaply cloneable.
    resume: Arc<Mutex<Option<serde_json::Value>>>,
}

impl<S: GraphState> RunContext<S> {
    pub fn new(config: RunnableConfig) -> Self {
        let resume = Arc::new(Mutex::new(config.resume_value.clone()));
        Self {
            config,
            stream_tx: None,
            stream_mode: HashSet::new(),
            resume,
        }
    }

    /// Suspends execution, surfacing `value` to the transport, unless this
    /// run is resuming into `node_id`, in which case the previously supplied
    /// human value is returned (once) and execution continues.
    ///
    /// The resume value is consumed on first use: if the same node interrupts
    /// again later in the run, it suspends again instead of replaying the
    /// stale answer.
    pub fn interrupt(
        &self,
        node_id: &str,
        value: serde_json::Value,
    ) -> Result<serde_json::Value, CoreError> {
        if self.config.resume_from_node_id.as_deref() == Some(node_id) {
            let taken = self
                .resume
                .lock()
                .map_err(|_| CoreError::InternalInvariant("resume slot poisoned".into()))?
                .take();
            if let Some(v) = taken {
                return Ok(v);
            }
        }
        Err(CoreError::Interrupted(GraphInterrupt(Interrupt::new(
            node_id, value,
        ))))
    }

    /// Emits an incremental message chunk (mode: Messages). Returns whether
    /// the event was sent.
    pub async fn emit_message(
        &self,
        node_id: impl Into<String>,
        content: impl Into<String>,
    ) -> bool {
        if !self.stream_mode.contains(&StreamMode::Messages) {
            return false;
        }
        let Some(tx) = &self.stream_tx else {
            return false;
        };
        tx.send(StreamEvent::Message {
            node_id: node_id.into(),
            chunk: MessageChunk {
                content: content.into(),
            },
        })
        .await
        .is_ok()
    }

    /// Whether the given mode is enabled for this run.
    pub fn is_streaming_mode(&self, mode: StreamMode) -> bool {
        self.stream_mode.contains(&mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConversationState;

    fn ctx_with(config: RunnableConfig) -> RunContext<ConversationState> {
        RunContext::new(config)
    }

    /// **Scenario**: interrupt with no resume target suspends with the payload.
    #[test]
    fn interrupt_without_resume_suspends() {
        let ctx = ctx_with(RunnableConfig::default());
        let err = ctx.interrupt("steer", serde_json::json!({"q": 1})).unwrap_err();
        match err {
            CoreError::Interrupted(gi) => {
                assert_eq!(gi.0.node_id, "steer");
                assert_eq!(gi.0.value, serde_json::json!({"q": 1}));
            }
            other => panic!("expected Interrupted, got {other:?}"),
        }
    }

    /// **Scenario**: resuming into the node returns the human value exactly once;
    /// a second interrupt in the same run suspends again.
    #[test]
    fn interrupt_resume_value_consumed_once() {
        let config = RunnableConfig {
            resume_from_node_id: Some("steer".into()),
            resume_value: Some(serde_json::json!("find jobs")),
            ..Default::default()
        };
        let ctx = ctx_with(config);

        let first = ctx.interrupt("steer", serde_json::json!(null)).unwrap();
        assert_eq!(first, serde_json::json!("find jobs"));

        let second = ctx.interrupt("steer", serde_json::json!(null));
        assert!(matches!(second, Err(CoreError::Interrupted(_))));
    }

    /// **Scenario**: a resume value aimed at another node does not leak.
    #[test]
    fn interrupt_resume_value_scoped_to_node() {
        let config = RunnableConfig {
            resume_from_node_id: Some("steer".into()),
            resume_value: Some(serde_json::json!("yes")),
            ..Default::default()
        };
        let ctx = ctx_with(config);
        let r = ctx.interrupt("other_node", serde_json::json!(null));
        assert!(matches!(r, Err(CoreError::Interrupted(_))));
    }
}
