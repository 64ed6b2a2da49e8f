//! Agents: the capability contract, the shared specialist runtime, the
//! concrete roster, and the read-only registry.
//!
//! Specialist identity is a closed enum ([`SpecialistKind`]); dispatch is by
//! the variant tag through [`AgentRegistry`]. Agents never hold references to
//! each other; delegation resolves ids through the registry at call time.

mod alex;
mod pendo;
mod registry;
mod roster;
mod runtime;
mod types;

pub use alex::AlexAgent;
pub use pendo::PendoAgent;
pub use registry::AgentRegistry;
pub use roster::{profile_for, specialist_agent};
pub use runtime::{IntentSpec, SpecialistProfile, SpecialistRuntime};
pub use types::{Agent, AgentCapabilities, AgentContext, AgentResponse};

use serde::{Deserialize, Serialize};

/// Closed set of agent identities: one supervisor plus seven specialists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialistKind {
    /// Supervisor: routing and coordination.
    Pendo,
    /// Emotional support and crisis.
    Alex,
    /// Resume and career transition.
    Mai,
    /// Veterans.
    Marcus,
    /// International professionals.
    Liv,
    /// Environmental justice.
    Miguel,
    /// Youth / early career (18+).
    Jasmine,
    /// Climate careers and sectors.
    Lauren,
}

impl SpecialistKind {
    /// Lowercase agent id used for prompt lookup and wire formats.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialistKind::Pendo => "pendo",
            SpecialistKind::Alex => "alex",
            SpecialistKind::Mai => "mai",
            SpecialistKind::Marcus => "marcus",
            SpecialistKind::Liv => "liv",
            SpecialistKind::Miguel => "miguel",
            SpecialistKind::Jasmine => "jasmine",
            SpecialistKind::Lauren => "lauren",
        }
    }

    /// Human-facing specialist type tag carried on responses.
    pub fn specialist_type(&self) -> &'static str {
        match self {
            SpecialistKind::Pendo => "supervisor",
            SpecialistKind::Alex => "empathy_specialist",
            SpecialistKind::Mai => "career_transition_specialist",
            SpecialistKind::Marcus => "veteran_specialist",
            SpecialistKind::Liv => "international_specialist",
            SpecialistKind::Miguel => "environmental_justice_specialist",
            SpecialistKind::Jasmine => "youth_specialist",
            SpecialistKind::Lauren => "climate_careers_specialist",
        }
    }

    /// The seven domain specialists (everything except the supervisor).
    pub fn specialists() -> [SpecialistKind; 7] {
        [
            SpecialistKind::Alex,
            SpecialistKind::Mai,
            SpecialistKind::Marcus,
            SpecialistKind::Liv,
            SpecialistKind::Miguel,
            SpecialistKind::Jasmine,
            SpecialistKind::Lauren,
        ]
    }
}

impl std::str::FromStr for SpecialistKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pendo" => Ok(SpecialistKind::Pendo),
            "alex" => Ok(SpecialistKind::Alex),
            "mai" => Ok(SpecialistKind::Mai),
            "marcus" => Ok(SpecialistKind::Marcus),
            "liv" => Ok(SpecialistKind::Liv),
            "miguel" => Ok(SpecialistKind::Miguel),
            "jasmine" => Ok(SpecialistKind::Jasmine),
            "lauren" => Ok(SpecialistKind::Lauren),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for SpecialistKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
