//! Concrete specialist roster: per-specialist profiles (intents, adjustments,
//! next-action tables, sources) and the plain specialist wrapper.
//!
//! Five of the seven specialists are the shared runtime with their profile;
//! alex adds the empathy sub-workflow ([`AlexAgent`](super::AlexAgent)) and
//! pendo adds routing and delegation ([`PendoAgent`](super::PendoAgent)).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::prompts::PromptRegistry;

use super::runtime::{IntentSpec, SpecialistProfile, SpecialistRuntime};
use super::types::{Agent, AgentCapabilities, AgentResponse};
use super::SpecialistKind;

const MAI_INTENTS: &[IntentSpec] = &[
    IntentSpec {
        name: "resume_review",
        description: "resume, CV, or LinkedIn review and optimization",
        confidence_adjustment: 0.05,
        next_actions: &[
            "Share your current resume for a targeted review",
            "Rework your top three bullet points around measurable outcomes",
        ],
        tools: &["resume_analysis"],
    },
    IntentSpec {
        name: "career_transition",
        description: "changing careers or moving into the climate economy",
        confidence_adjustment: 0.0,
        next_actions: &[
            "Map your transferable skills to adjacent climate roles",
            "Pick one or two short courses to close the biggest skill gap",
        ],
        tools: &["skill_mapping"],
    },
    IntentSpec {
        name: "interview_prep",
        description: "interview preparation and practice",
        confidence_adjustment: 0.0,
        next_actions: &[
            "Prepare one impact story and one mission-fit story",
            "Schedule a practice interview session",
        ],
        tools: &["interview_prep"],
    },
];

const MARCUS_INTENTS: &[IntentSpec] = &[
    IntentSpec {
        name: "mos_translation",
        description: "translating a military occupational specialty into civilian roles",
        confidence_adjustment: 0.1,
        next_actions: &[
            "Translate your MOS into the civilian titles recruiters search for",
            "Target grid operations and field service leadership roles",
        ],
        tools: &["mos_translator"],
    },
    IntentSpec {
        name: "veteran_benefits",
        description: "GI Bill, SkillBridge, VA, or other veteran programs",
        confidence_adjustment: 0.05,
        next_actions: &[
            "Check GI Bill and SkillBridge eligibility for climate training",
            "Contact your state workforce board about funded certifications",
        ],
        tools: &["benefits_lookup"],
    },
    IntentSpec {
        name: "civilian_transition",
        description: "general military-to-civilian career transition",
        confidence_adjustment: 0.0,
        next_actions: &[
            "Build a transition plan with target roles and certifications",
            "Join a veterans-in-clean-energy network",
        ],
        tools: &["transition_planner"],
    },
];

const LIV_INTENTS: &[IntentSpec] = &[
    IntentSpec {
        name: "visa_guidance",
        description: "visa status, work authorization, or sponsorship",
        confidence_adjustment: 0.0,
        next_actions: &[
            "List climate employers with a sponsorship track record",
            "Consult an immigration attorney for status-specific advice",
        ],
        tools: &["sponsor_directory"],
    },
    IntentSpec {
        name: "credential_evaluation",
        description: "evaluating non-US degrees and credentials",
        confidence_adjustment: 0.05,
        next_actions: &[
            "Order a credential evaluation from a recognized service",
            "Add the US-equivalent degree framing to your resume",
        ],
        tools: &["credential_eval"],
    },
    IntentSpec {
        name: "international_experience",
        description: "positioning international experience for US employers",
        confidence_adjustment: 0.0,
        next_actions: &[
            "Reframe international experience as global-market expertise",
            "Highlight multilingual and cross-cultural project work",
        ],
        tools: &["profile_positioning"],
    },
];

const MIGUEL_INTENTS: &[IntentSpec] = &[
    IntentSpec {
        name: "environmental_justice",
        description: "environmental justice and frontline community work",
        confidence_adjustment: 0.05,
        next_actions: &[
            "List environmental justice organizations hiring in your area",
            "Frame your community experience as a core qualification",
        ],
        tools: &["ej_directory"],
    },
    IntentSpec {
        name: "community_organizing",
        description: "organizing, coalitions, and community engagement careers",
        confidence_adjustment: 0.0,
        next_actions: &[
            "Map your organizing wins to climate job descriptions",
            "Reach out to two coalition staff for informational interviews",
        ],
        tools: &["campaign_mapper"],
    },
    IntentSpec {
        name: "equity_careers",
        description: "equity-centered roles in policy, utilities, and finance",
        confidence_adjustment: 0.0,
        next_actions: &[
            "Target equity roles at utilities and community development funds",
            "Follow two equity-in-climate policy programs",
        ],
        tools: &["equity_roles"],
    },
];

const JASMINE_INTENTS: &[IntentSpec] = &[
    IntentSpec {
        name: "early_career",
        description: "first jobs and early-career direction (students, new grads)",
        confidence_adjustment: 0.05,
        next_actions: &[
            "Pick one internship, one portfolio project, and one community",
            "Draft a semester plan with weekly checkpoints",
        ],
        tools: &["pathway_planner"],
    },
    IntentSpec {
        name: "internships",
        description: "internships, fellowships, and co-ops",
        confidence_adjustment: 0.05,
        next_actions: &[
            "Shortlist three programs with strong conversion rates",
            "Tailor each application instead of mass-applying",
        ],
        tools: &["internship_finder"],
    },
    IntentSpec {
        name: "skills_foundation",
        description: "foundational skills to build before applying",
        confidence_adjustment: 0.0,
        next_actions: &[
            "Choose one data skill and one communication artifact to build",
            "Pick a climate domain to follow closely this semester",
        ],
        tools: &["skills_planner"],
    },
];

const LAUREN_INTENTS: &[IntentSpec] = &[
    IntentSpec {
        name: "climate_sectors",
        description: "overview of climate-economy sectors and where they're growing",
        confidence_adjustment: 0.05,
        next_actions: &[
            "Narrow to one or two sectors that match the work you enjoy",
            "Review current openings in grid modernization and solar",
        ],
        tools: &["sector_explorer"],
    },
    IntentSpec {
        name: "green_jobs",
        description: "specific green jobs and role matching",
        confidence_adjustment: 0.05,
        next_actions: &[
            "Match your current skills to hard-to-fill climate roles",
            "Set up alerts for the two best-fit job titles",
        ],
        tools: &["job_matcher"],
    },
    IntentSpec {
        name: "market_trends",
        description: "climate job market data and hiring trends",
        confidence_adjustment: 0.0,
        next_actions: &[
            "Focus your search on implementation roles",
            "Track quarterly hiring reports for your target sector",
        ],
        tools: &["market_insights"],
    },
];

pub(super) const ALEX_INTENTS: &[IntentSpec] = &[
    IntentSpec {
        name: "emotional_support",
        description: "stress, overwhelm, or anxiety about career and life",
        confidence_adjustment: 0.05,
        next_actions: &[
            "Take one small, concrete step today",
            "Name the part of this that feels heaviest so we can start there",
        ],
        tools: &["empathy_workflow"],
    },
    IntentSpec {
        name: "crisis_intervention",
        description: "hopelessness, despair, or crisis signals needing immediate support",
        confidence_adjustment: 0.1,
        next_actions: &[
            "Reach the 988 Suicide & Crisis Lifeline (call or text 988)",
            "Stay in touch with someone you trust today",
        ],
        tools: &["crisis_escalation"],
    },
    IntentSpec {
        name: "confidence_building",
        description: "self-doubt or low confidence about qualifications",
        confidence_adjustment: 0.0,
        next_actions: &[
            "List three strengths your experience already proves",
            "Revisit one past win and what it says about you",
        ],
        tools: &["strengths_inventory"],
    },
];

pub(super) const PENDO_INTENTS: &[IntentSpec] = &[
    IntentSpec {
        name: "general_coordination",
        description: "general career question without a clear specialist need",
        confidence_adjustment: 0.0,
        next_actions: &[
            "Share a bit about your background so I can route you well",
            "Pick the area you want to start with",
        ],
        tools: &["specialist_router"],
    },
    IntentSpec {
        name: "user_assessment",
        description: "taking stock of the user's skills, interests, and situation",
        confidence_adjustment: 0.0,
        next_actions: &[
            "Walk through your experience and the skills you enjoy using",
            "Identify the climate areas that interest you most",
        ],
        tools: &["profile_assessment"],
    },
    IntentSpec {
        name: "climate_overview",
        description: "what the climate economy is and where the jobs are",
        confidence_adjustment: 0.0,
        next_actions: &[
            "Get a sector-by-sector overview from our climate specialist",
            "Pick one sector to explore in depth",
        ],
        tools: &["sector_explorer"],
    },
    IntentSpec {
        name: "crisis_support",
        description: "distress or crisis signals that need the support specialist",
        confidence_adjustment: 0.1,
        next_actions: &[
            "Connect with Alex, our support specialist",
            "Reach the 988 Suicide & Crisis Lifeline if you need immediate help",
        ],
        tools: &["crisis_routing"],
    },
    IntentSpec {
        name: "specialist_routing",
        description: "a question clearly belonging to one domain specialist",
        confidence_adjustment: 0.05,
        next_actions: &[
            "Continue with the specialist best placed for this topic",
        ],
        tools: &["specialist_router"],
    },
];

/// Static profile for a specialist kind.
pub fn profile_for(kind: SpecialistKind) -> SpecialistProfile {
    match kind {
        SpecialistKind::Pendo => SpecialistProfile {
            kind,
            domains: &["routing", "coordination"],
            intents: PENDO_INTENTS,
            fallback_intent: "general_coordination",
            sources: &["Verdant specialist network"],
        },
        SpecialistKind::Alex => SpecialistProfile {
            kind,
            domains: &["emotional support", "crisis"],
            intents: ALEX_INTENTS,
            fallback_intent: "emotional_support",
            sources: &["988 Suicide & Crisis Lifeline"],
        },
        SpecialistKind::Mai => SpecialistProfile {
            kind,
            domains: &["resume", "career transition"],
            intents: MAI_INTENTS,
            fallback_intent: "career_transition",
            sources: &["Verdant career playbooks"],
        },
        SpecialistKind::Marcus => SpecialistProfile {
            kind,
            domains: &["veterans"],
            intents: MARCUS_INTENTS,
            fallback_intent: "civilian_transition",
            sources: &["Veteran workforce programs"],
        },
        SpecialistKind::Liv => SpecialistProfile {
            kind,
            domains: &["international professionals"],
            intents: LIV_INTENTS,
            fallback_intent: "international_experience",
            sources: &["Credential evaluation services"],
        },
        SpecialistKind::Miguel => SpecialistProfile {
            kind,
            domains: &["environmental justice"],
            intents: MIGUEL_INTENTS,
            fallback_intent: "environmental_justice",
            sources: &["Environmental justice network"],
        },
        SpecialistKind::Jasmine => SpecialistProfile {
            kind,
            domains: &["youth", "early career"],
            intents: JASMINE_INTENTS,
            fallback_intent: "early_career",
            sources: &["Early-career climate programs"],
        },
        SpecialistKind::Lauren => SpecialistProfile {
            kind,
            domains: &["climate careers", "green jobs"],
            intents: LAUREN_INTENTS,
            fallback_intent: "climate_sectors",
            sources: &["Climate labor market reports"],
        },
    }
}

/// Plain specialist: the shared runtime with a profile, nothing more.
struct SpecialistAgent {
    runtime: SpecialistRuntime,
}

#[async_trait]
impl Agent for SpecialistAgent {
    fn kind(&self) -> SpecialistKind {
        self.runtime.profile().kind
    }

    fn get_capabilities(&self) -> AgentCapabilities {
        self.runtime.capabilities()
    }

    async fn handle_interaction(
        &self,
        message: &str,
        user_id: &str,
        conversation_id: &str,
        session_data: Option<BTreeMap<String, serde_json::Value>>,
        user_profile: Option<BTreeMap<String, serde_json::Value>>,
    ) -> AgentResponse {
        self.runtime
            .handle(message, user_id, conversation_id, session_data, user_profile)
            .await
    }
}

/// Builds a plain specialist agent for `kind`. Callers use
/// [`AlexAgent`](super::AlexAgent) and [`PendoAgent`](super::PendoAgent) for
/// the two kinds with extra behavior.
pub fn specialist_agent(
    kind: SpecialistKind,
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptRegistry>,
) -> Arc<dyn Agent> {
    Arc::new(SpecialistAgent {
        runtime: SpecialistRuntime::new(profile_for(kind), llm, prompts),
    })
}
