//! Streaming types for graph runs.
//!
//! Stream modes select which events `CompiledStateGraph::stream` emits; the
//! transport turns them into SSE frames. Nodes can emit incremental message
//! chunks through the run context.

use std::collections::HashSet;

use serde::Serialize;

/// Which kinds of events to emit during a streamed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamMode {
    /// Full state snapshot after each node completes.
    Values,
    /// Per-node incremental update (node id + state after merge).
    Updates,
    /// Incremental message chunks emitted by nodes.
    Messages,
    /// Node lifecycle events (start/end).
    Tasks,
    /// Interrupt surfacing (suspension context).
    Interrupts,
}

impl StreamMode {
    /// The default mode set used by the chat transport: per-node updates plus
    /// interrupts, which is what the SSE stream forwards.
    pub fn transport_default() -> HashSet<StreamMode> {
        HashSet::from_iter([StreamMode::Updates, StreamMode::Messages, StreamMode::Interrupts])
    }
}

/// One incremental chunk of assistant text.
#[derive(Clone, Debug, Serialize)]
pub struct MessageChunk {
    pub content: String,
}

/// Event emitted during a streamed graph run.
#[derive(Clone, Debug)]
pub enum StreamEvent<S> {
    /// Full state after a node completed (mode: Values).
    Values(S),
    /// State after merging one node's delta (mode: Updates).
    Updates { node_id: String, state: S },
    /// Incremental message chunk from a node (mode: Messages).
    Message { node_id: String, chunk: MessageChunk },
    /// Node started (mode: Tasks).
    TaskStart { node_id: String },
    /// Node finished; Err carries the rendered error (mode: Tasks).
    TaskEnd { node_id: String, result: Result<(), String> },
    /// Execution suspended awaiting human input (mode: Interrupts).
    Interrupted { node_id: String, value: serde_json::Value },
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: the transport default includes Updates, Messages and Interrupts only.
    #[test]
    fn transport_default_modes() {
        let modes = StreamMode::transport_default();
        assert!(modes.contains(&StreamMode::Updates));
        assert!(modes.contains(&StreamMode::Messages));
        assert!(modes.contains(&StreamMode::Interrupts));
        assert!(!modes.contains(&StreamMode::Values));
        assert!(!modes.contains(&StreamMode::Tasks));
    }
}
