//! Workflows: the supervisor graph, the empathy sub-workflow, the partner
//! directory collaborator, and the per-turn conversation service.

mod empathy;
mod partners;
mod service;
mod supervisor;

pub use empathy::{ActionPlan, EmpathyOutcome, EmpathyState, EmpathyUpdate, EmpathyWorkflow};
pub use partners::{match_confidence, PartnerDirectory, PartnerMatch, StaticPartnerDirectory};
pub use service::{ConversationService, RoutingInfo, TurnOutcome, TurnResponse};
pub use supervisor::{
    is_bare_greeting, SupervisorWorkflow, CONFIDENCE_GATE, MAX_STEERING, MAX_STEPS,
};
