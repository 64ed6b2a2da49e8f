//! Core error taxonomy.
//!
//! One enum for the orchestration core; collaborator errors (LLM, memory,
//! session) convert into it at the boundary so workflow nodes and agents
//! propagate a single type with `?`.

use thiserror::Error;

use crate::graph::GraphInterrupt;
use crate::llm::LlmError;

/// Error returned by agents, workflow nodes, and the graph engine.
///
/// `Interrupted` is not a failure: it is how a node suspends execution for
/// human input. The run loop catches it, checkpoints, and surfaces the
/// interrupt context to the transport.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller supplied an empty message or missing identifiers.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No principal resolved for the request.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Principal lacks permission for the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A referenced record (conversation, session, profile) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An external dependency is not configured or not reachable.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// A collaborator call exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The request was cancelled at the transport boundary.
    #[error("cancelled")]
    Cancelled,

    /// The LLM returned output that does not conform to the requested schema.
    #[error("bad structured output: {0}")]
    BadStructuredOutput(String),

    /// No prompt set registered for the given agent id.
    #[error("unknown prompt: {0}")]
    UnknownPrompt(String),

    /// A state-machine invariant was violated (bug, not user error).
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    /// Graph execution suspended awaiting human input.
    #[error("graph interrupted: {0}")]
    Interrupted(GraphInterrupt),
}

impl From<GraphInterrupt> for CoreError {
    fn from(interrupt: GraphInterrupt) -> Self {
        CoreError::Interrupted(interrupt)
    }
}

impl From<LlmError> for CoreError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Unavailable => CoreError::Unavailable("llm gateway".into()),
            LlmError::Timeout => CoreError::Timeout("llm call".into()),
            LlmError::Transport(msg) => CoreError::Unavailable(format!("llm transport: {msg}")),
            LlmError::BadStructuredOutput(msg) => CoreError::BadStructuredOutput(msg),
            LlmError::Cancelled => CoreError::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Display of each variant contains its taxonomy keyword.
    #[test]
    fn core_error_display_keywords() {
        assert!(CoreError::InvalidInput("m".into()).to_string().contains("invalid input"));
        assert!(CoreError::Unauthenticated.to_string().contains("unauthenticated"));
        assert!(CoreError::Timeout("llm".into()).to_string().contains("timeout"));
        assert!(CoreError::UnknownPrompt("zed".into()).to_string().contains("zed"));
        assert!(CoreError::Cancelled.to_string().contains("cancelled"));
    }

    /// **Scenario**: each LlmError kind maps onto the matching core variant.
    #[test]
    fn llm_error_maps_into_core_taxonomy() {
        assert!(matches!(CoreError::from(LlmError::Unavailable), CoreError::Unavailable(_)));
        assert!(matches!(CoreError::from(LlmError::Timeout), CoreError::Timeout(_)));
        assert!(matches!(
            CoreError::from(LlmError::BadStructuredOutput("x".into())),
            CoreError::BadStructuredOutput(_)
        ));
        assert!(matches!(CoreError::from(LlmError::Cancelled), CoreError::Cancelled));
    }
}
