//! Prompt registry: read-only lookup of agent system prompts and response
//! templates by agent id.
//!
//! Loaded once at startup from a YAML pack embedded at compile time; no
//! mutation after initialization. Lookup is O(1); unknown agent ids fail with
//! `CoreError::UnknownPrompt`. Shared as `Arc<PromptRegistry>`.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::CoreError;

/// Embedded prompt pack; override by constructing with [`PromptRegistry::from_yaml`].
const EMBEDDED_PACK: &str = include_str!("../../prompts/agents.yaml");

/// Prompts and templates for one agent.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptSet {
    pub system_prompt: String,
    /// Intent → response template. `{message}` expands to the user message.
    #[serde(default)]
    pub templates: HashMap<String, String>,
    /// Free-form per-agent configuration (fallback intent, tone, etc.).
    #[serde(default)]
    pub config: HashMap<String, String>,
}

/// Immutable agent id → prompt set mapping.
#[derive(Debug)]
pub struct PromptRegistry {
    sets: HashMap<String, PromptSet>,
}

impl PromptRegistry {
    /// Parses the pack compiled into the binary.
    pub fn from_embedded() -> Result<Self, CoreError> {
        Self::from_yaml(EMBEDDED_PACK)
    }

    /// Parses a YAML pack: top-level map of agent id → prompt set.
    pub fn from_yaml(yaml: &str) -> Result<Self, CoreError> {
        let sets: HashMap<String, PromptSet> = serde_yaml::from_str(yaml)
            .map_err(|e| CoreError::InternalInvariant(format!("prompt pack parse: {e}")))?;
        Ok(Self { sets })
    }

    /// Prompt set for an agent; unknown ids fail with `UnknownPrompt`.
    pub fn get(&self, agent_id: &str) -> Result<&PromptSet, CoreError> {
        self.sets
            .get(agent_id)
            .ok_or_else(|| CoreError::UnknownPrompt(agent_id.to_string()))
    }

    /// Response template for `(agent, intent)`, if one is registered.
    pub fn template(&self, agent_id: &str, intent: &str) -> Option<&str> {
        self.sets
            .get(agent_id)
            .and_then(|s| s.templates.get(intent))
            .map(String::as_str)
    }

    /// Registered agent ids (for capability listings).
    pub fn agent_ids(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: the embedded pack parses and contains all eight agents.
    #[test]
    fn embedded_pack_has_all_agents() {
        let registry = PromptRegistry::from_embedded().expect("embedded pack parses");
        for agent in ["pendo", "alex", "mai", "marcus", "liv", "miguel", "jasmine", "lauren"] {
            let set = registry.get(agent).unwrap_or_else(|_| panic!("missing {agent}"));
            assert!(!set.system_prompt.is_empty(), "{agent} has a system prompt");
            assert!(!set.templates.is_empty(), "{agent} has templates");
        }
    }

    /// **Scenario**: lookup is idempotent; repeated gets return the same bytes
    /// loaded at init (prompt round-trip law).
    #[test]
    fn lookup_is_idempotent() {
        let registry = PromptRegistry::from_embedded().unwrap();
        let first = registry.get("mai").unwrap().system_prompt.clone();
        let second = registry.get("mai").unwrap().system_prompt.clone();
        assert_eq!(first, second);
    }

    /// **Scenario**: unknown agent id fails with UnknownPrompt.
    #[test]
    fn unknown_agent_fails() {
        let registry = PromptRegistry::from_embedded().unwrap();
        match registry.get("zed") {
            Err(CoreError::UnknownPrompt(id)) => assert_eq!(id, "zed"),
            other => panic!("expected UnknownPrompt, got {other:?}"),
        }
    }

    /// **Scenario**: a custom pack overrides the embedded one.
    #[test]
    fn custom_pack_parses() {
        let yaml = r#"
tester:
  system_prompt: "You test things."
  templates:
    default: "Tested: {message}"
  config:
    fallback_intent: default
"#;
        let registry = PromptRegistry::from_yaml(yaml).unwrap();
        assert_eq!(registry.template("tester", "default"), Some("Tested: {message}"));
        assert_eq!(
            registry.get("tester").unwrap().config.get("fallback_intent").map(String::as_str),
            Some("default")
        );
    }
}
