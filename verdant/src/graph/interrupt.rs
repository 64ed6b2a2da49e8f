//! Interrupt primitive for human-in-the-loop suspension.
//!
//! A node raises an interrupt through [`RunContext::interrupt`]
//! (crate::graph::RunContext::interrupt); the run loop checkpoints the state
//! reached so far and surfaces the context to the transport. On resume the
//! same node re-executes and the call returns the human-supplied value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Context surfaced to the caller when execution suspends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interrupt {
    /// Arbitrary JSON payload shown to the human (guidance, options, question).
    pub value: serde_json::Value,
    /// Node that raised the interrupt; resume re-enters this node.
    pub node_id: String,
}

impl Interrupt {
    pub fn new(node_id: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            value,
            node_id: node_id.into(),
        }
    }
}

/// Error wrapper the run loop catches to distinguish suspension from failure.
#[derive(Debug, Clone, Error)]
#[error("interrupted at {}: {}", .0.node_id, .0.value)]
pub struct GraphInterrupt(pub Interrupt);

impl From<Interrupt> for GraphInterrupt {
    fn from(interrupt: Interrupt) -> Self {
        GraphInterrupt(interrupt)
    }
}
