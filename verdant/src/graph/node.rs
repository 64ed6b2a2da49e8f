//! Node trait and next-step result.

use async_trait::async_trait;

use crate::error::CoreError;

use super::{GraphState, RunContext};

/// Next step after running a node.
///
/// - **Continue**: follow the single outgoing edge (or linear order).
/// - **Node(id)**: jump to the given node.
/// - **End**: stop; the merged state is the final result.
///
/// Ignored when the node has conditional edges; the router decides instead.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Next {
    Continue,
    Node(String),
    End,
}

/// A named, async graph node: state in, delta out.
///
/// Nodes never mutate state directly; they return a delta the engine merges
/// with the state's reducers. Collaborator calls inside a node honor the
/// deadline carried by `ctx.config`.
#[async_trait]
pub trait Node<S: GraphState>: Send + Sync {
    /// Stable node id used for edges, routing, and resume.
    fn id(&self) -> &str;

    /// One step: read state, produce a partial update and the next hop.
    async fn run(&self, state: S, ctx: &RunContext<S>) -> Result<(S::Delta, Next), CoreError>;
}
