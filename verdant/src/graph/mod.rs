//! Workflow graph engine: typed state machine with conditional edges,
//! suspendable interrupts, and per-field reducers.
//!
//! Nodes are pure `state in, delta out` async functions; the engine merges
//! each delta atomically via [`GraphState::apply`] and then routes using the
//! node's [`Next`] or the node's conditional router. A node suspends by
//! calling [`RunContext::interrupt`]; the engine checkpoints and surfaces the
//! interrupt, and on resume the same node is re-entered with the
//! human-supplied value.

mod compiled;
mod conditional;
mod interrupt;
mod logging;
mod node;
mod run_context;
mod state_graph;

pub use compiled::CompiledStateGraph;
pub use conditional::{ConditionalRouter, ConditionalRouterFn, NextEntry};
pub use interrupt::{GraphInterrupt, Interrupt};
pub use node::{Next, Node};
pub use run_context::RunContext;
pub use state_graph::{CompilationError, StateGraph, END, START};

use std::fmt::Debug;

/// Graph state with an associated delta type and documented merge semantics.
///
/// `apply` is the reducer: message-like fields append (dedup by id), scalars
/// are last-writer-wins, counters are monotonic. Each node's delta is applied
/// atomically by the run loop.
pub trait GraphState: Clone + Send + Sync + Debug + 'static {
    /// Partial update returned by nodes.
    type Delta: Clone + Send + Sync + Debug + 'static;

    /// Merges one delta into the state.
    fn apply(&mut self, delta: Self::Delta);

    /// Delta produced by the engine when a node fails: must flag the state
    /// for human review and carry a safe user-facing message.
    fn error_delta(message: &str) -> Self::Delta;
}
