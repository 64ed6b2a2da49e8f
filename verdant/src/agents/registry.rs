//! Read-only agent registry: id → agent, built once at startup.
//!
//! Agents resolve each other through the registry at call time instead of
//! holding references, which keeps the supervisor ↔ specialist relationship
//! acyclic.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CoreError;
use crate::llm::LlmClient;
use crate::prompts::PromptRegistry;

use super::alex::AlexAgent;
use super::pendo::PendoAgent;
use super::roster::specialist_agent;
use super::types::{Agent, AgentCapabilities};
use super::SpecialistKind;

pub struct AgentRegistry {
    agents: HashMap<SpecialistKind, Arc<dyn Agent>>,
    pendo: Option<Arc<PendoAgent>>,
}

impl AgentRegistry {
    /// Empty registry (tests and partial setups).
    pub fn empty() -> Self {
        Self {
            agents: HashMap::new(),
            pendo: None,
        }
    }

    /// Builds the full roster: pendo plus the seven specialists, all sharing
    /// the same gateway and prompt registry.
    pub fn build(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptRegistry>,
    ) -> Result<Self, CoreError> {
        let mut agents: HashMap<SpecialistKind, Arc<dyn Agent>> = HashMap::new();

        let pendo = Arc::new(PendoAgent::new(llm.clone(), prompts.clone()));
        agents.insert(SpecialistKind::Pendo, pendo.clone());

        let alex: Arc<dyn Agent> = Arc::new(AlexAgent::new(llm.clone(), prompts.clone())?);
        agents.insert(SpecialistKind::Alex, alex);

        for kind in [
            SpecialistKind::Mai,
            SpecialistKind::Marcus,
            SpecialistKind::Liv,
            SpecialistKind::Miguel,
            SpecialistKind::Jasmine,
            SpecialistKind::Lauren,
        ] {
            agents.insert(kind, specialist_agent(kind, llm.clone(), prompts.clone()));
        }

        Ok(Self {
            agents,
            pendo: Some(pendo),
        })
    }

    pub fn get(&self, kind: SpecialistKind) -> Option<Arc<dyn Agent>> {
        self.agents.get(&kind).cloned()
    }

    /// The supervisor, when registered via [`AgentRegistry::build`].
    pub fn supervisor(&self) -> Option<Arc<PendoAgent>> {
        self.pendo.clone()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Capability listing across the roster (stats endpoint).
    pub fn capabilities(&self) -> Vec<AgentCapabilities> {
        let mut caps: Vec<AgentCapabilities> =
            self.agents.values().map(|a| a.get_capabilities()).collect();
        caps.sort_by_key(|c| c.kind.as_str());
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    /// **Scenario**: the default build registers all eight agents.
    #[tokio::test]
    async fn build_registers_all_eight() {
        let registry = AgentRegistry::build(
            Arc::new(MockLlm::new()),
            Arc::new(PromptRegistry::from_embedded().unwrap()),
        )
        .unwrap();
        assert_eq!(registry.len(), 8);
        assert!(registry.supervisor().is_some());
        for kind in SpecialistKind::specialists() {
            assert!(registry.get(kind).is_some(), "{kind} registered");
        }
    }

    /// **Scenario**: delegation through the registry stamps supervisor
    /// metadata with an RFC 3339 timestamp (delegation transparency).
    #[tokio::test]
    async fn delegation_stamps_metadata() {
        let llm: Arc<MockLlm> = Arc::new(MockLlm::new().with_structured_failure());
        let registry =
            AgentRegistry::build(llm, Arc::new(PromptRegistry::from_embedded().unwrap()))
                .unwrap();
        let pendo = registry.supervisor().unwrap();
        let ctx = crate::agents::AgentContext::new("u1", "c1");

        let r = pendo
            .delegate_to_specialist(&registry, SpecialistKind::Alex, "I need support", &ctx)
            .await;
        assert_eq!(r.metadata["delegated_by"], serde_json::json!("pendo"));
        let ts = r.metadata["delegation_timestamp"].as_str().unwrap();
        assert!(
            chrono::DateTime::parse_from_rfc3339(ts).is_ok(),
            "delegation timestamp is ISO-8601: {ts}"
        );
        assert!(r.specialist_type.contains("empathy"));
    }
}
