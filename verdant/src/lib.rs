//! # Verdant
//!
//! A multi-specialist conversational runtime for climate-economy career
//! guidance, built on a **state-in, delta-out** graph engine: one shared
//! conversation state flows through named nodes, each returning a partial
//! update merged by documented reducers.
//!
//! ## Design principles
//!
//! - **Typed state machine**: the supervisor workflow is a [`StateGraph`] of
//!   pure nodes with conditional routing; messages accumulate via an
//!   append-only, id-deduplicated reducer, so suspend/resume can never lose
//!   or duplicate a message.
//! - **Suspendable execution**: a node pauses with [`RunContext::interrupt`];
//!   the engine checkpoints and the same node re-enters with the human value.
//! - **Closed specialist identity**: eight agents ([`SpecialistKind`]) share
//!   one runtime pipeline and resolve each other by id through a read-only
//!   [`AgentRegistry`], with no cross-agent references.
//! - **LLM-driven classification**: intent, routing, and emotional
//!   assessments are structured-output calls with documented conservative
//!   fallbacks; keyword heuristics appear only on the fallback paths.
//!
//! ## Main modules
//!
//! - [`graph`]: [`StateGraph`], [`CompiledStateGraph`], [`Node`], [`Next`],
//!   [`RunContext`]: build and run state graphs.
//! - [`channels`]: per-field reducers (append-by-key, last-writer-wins,
//!   monotonic counters).
//! - [`state`]: [`ConversationState`], [`Finding`], assessments, and the
//!   [`aggregate_confidence`] gate function.
//! - [`agents`]: the [`Agent`] contract, [`SpecialistRuntime`], the roster,
//!   [`PendoAgent`] (supervisor), [`AlexAgent`] (empathy), [`AgentRegistry`].
//! - [`workflows`]: [`SupervisorWorkflow`], [`EmpathyWorkflow`],
//!   [`PartnerDirectory`], [`ConversationService`].
//! - [`llm`]: [`LlmClient`] with [`OpenAiGateway`] and scripted [`MockLlm`].
//! - [`memory`]: [`Checkpointer`]/[`MemorySaver`] and per-agent
//!   [`AgentMemory`].
//! - [`prompts`]: immutable [`PromptRegistry`] loaded at startup.
//! - [`reflection`]: post-hoc quality scoring with safe fallbacks.
//! - [`session`]: [`SessionTracker`] and the workflow-session stores.
//! - [`auth`]: [`Principal`] and the [`AuthVerifier`] collaborator.
//! - [`stream`]: [`StreamMode`]/[`StreamEvent`] for incremental output.

pub mod agents;
pub mod auth;
pub mod channels;
pub mod error;
pub mod graph;
pub mod llm;
pub mod memory;
pub mod message;
pub mod prompts;
pub mod reflection;
pub mod session;
pub mod state;
pub mod stream;
pub mod workflows;

pub use agents::{
    Agent, AgentContext, AgentRegistry, AgentResponse, AlexAgent, PendoAgent, SpecialistKind,
    SpecialistRuntime,
};
pub use auth::{AuthVerifier, Principal, UserType};
pub use error::CoreError;
pub use graph::{CompiledStateGraph, Next, Node, RunContext, StateGraph, END, START};
pub use llm::{LlmClient, MockLlm, OpenAiGateway};
pub use memory::{AgentMemory, Checkpointer, MemorySaver, RunnableConfig};
pub use message::{Message, MessageKind};
pub use prompts::PromptRegistry;
pub use session::{SessionStore, SessionTracker};
pub use state::{aggregate_confidence, ConversationState, ConversationUpdate, Finding, FindingKind};
pub use stream::{StreamEvent, StreamMode};
pub use workflows::{
    ConversationService, EmpathyWorkflow, PartnerDirectory, PartnerMatch, StaticPartnerDirectory,
    SupervisorWorkflow,
};
