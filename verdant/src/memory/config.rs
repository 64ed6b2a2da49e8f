//! Invoke config: thread identity, deadline, and resume target.

use std::time::Duration;

/// Config for a single graph invoke. Identifies the conversation thread,
/// carries the transport deadline, and (on resume) names the suspended node
/// plus the human-supplied value.
#[derive(Debug, Clone, Default)]
pub struct RunnableConfig {
    /// Unique id for this conversation/thread. Required when checkpointing.
    pub thread_id: Option<String>,
    /// Optional namespace for checkpoints (e.g. a sub-workflow).
    pub checkpoint_ns: String,
    /// Optional user id for memory namespacing and logging.
    pub user_id: Option<String>,
    /// When set, the run starts from this node instead of the entry (resume
    /// after an interrupt).
    pub resume_from_node_id: Option<String>,
    /// Human-supplied value returned by the resumed node's `interrupt` call.
    pub resume_value: Option<serde_json::Value>,
    /// Deadline propagated into every collaborator call made by nodes.
    pub deadline: Option<Duration>,
}

impl RunnableConfig {
    /// Config for one conversation turn.
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            ..Default::default()
        }
    }

    /// Sets the transport deadline (builder).
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Marks this run as a resume into `node_id` with the human's value.
    pub fn resuming(mut self, node_id: impl Into<String>, value: serde_json::Value) -> Self {
        self.resume_from_node_id = Some(node_id.into());
        self.resume_value = Some(value);
        self
    }
}
