//! Partner directory collaborator: candidate organizations ranked by match
//! score.
//!
//! The ranking function belongs to the persistence collaborator; the core
//! consumes `match_score` as-is. [`StaticPartnerDirectory`] is the
//! deterministic dev/test implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One partner opportunity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerMatch {
    pub organization: String,
    pub role: String,
    pub match_score: f32,
    pub career_page_url: String,
    pub contact: String,
    pub location: String,
    pub salary_range: String,
}

/// Maximum match score across candidates; 0.0 when there are none. This is
/// the confidence attached to a `partner_matches` finding.
pub fn match_confidence(matches: &[PartnerMatch]) -> f32 {
    matches
        .iter()
        .map(|m| m.match_score)
        .fold(0.0f32, f32::max)
        .clamp(0.0, 1.0)
}

/// Partner database collaborator consumed by the partner-matching node.
#[async_trait]
pub trait PartnerDirectory: Send + Sync {
    /// Candidates for the given interest, best matches first, at most `limit`.
    async fn find_matches(&self, query: &str, limit: usize)
        -> Result<Vec<PartnerMatch>, CoreError>;
}

/// Fixed-content directory for development and tests.
pub struct StaticPartnerDirectory {
    matches: Vec<PartnerMatch>,
}

impl StaticPartnerDirectory {
    /// Two representative partners, scores descending.
    pub fn sample() -> Self {
        Self {
            matches: Self::sample_matches(),
        }
    }

    /// The sample records themselves, for seeding state in tests.
    pub fn sample_matches() -> Vec<PartnerMatch> {
        vec![
            PartnerMatch {
                organization: "Massachusetts Clean Energy Center".into(),
                role: "Climate Data Analyst".into(),
                match_score: 0.92,
                career_page_url: "https://masscec.com/careers".into(),
                contact: "Sarah Johnson, Talent Acquisition".into(),
                location: "Boston, MA".into(),
                salary_range: "$70,000-$85,000".into(),
            },
            PartnerMatch {
                organization: "Eversource Energy".into(),
                role: "Sustainability Program Manager".into(),
                match_score: 0.87,
                career_page_url: "https://eversource.com/careers".into(),
                contact: "Mike Chen, Hiring Manager".into(),
                location: "Westwood, MA".into(),
                salary_range: "$75,000-$90,000".into(),
            },
        ]
    }

    pub fn with_matches(matches: Vec<PartnerMatch>) -> Self {
        Self { matches }
    }

    pub fn empty() -> Self {
        Self { matches: Vec::new() }
    }
}

#[async_trait]
impl PartnerDirectory for StaticPartnerDirectory {
    async fn find_matches(
        &self,
        _query: &str,
        limit: usize,
    ) -> Result<Vec<PartnerMatch>, CoreError> {
        Ok(self.matches.iter().take(limit).cloned().collect())
    }
}
