//! Post-hoc reflection: quality scoring and improvement synthesis per agent.
//!
//! Runs after each agent turn (fire-and-forget from the runtime). Never
//! propagates errors: LLM or parse failures fall back to defaults (quality
//! 0.8, canned strengths/improvements) so reflection can never break a turn.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::llm::{parse_structured, CallOptions, LlmClient, OutputSchema};
use crate::message::Message;

/// Cap on retained reflections; older entries fall off the front.
const HISTORY_CAP: usize = 50;

/// One reflection over a completed interaction.
#[derive(Debug, Clone)]
pub struct Reflection {
    pub quality_score: f32,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub lessons_learned: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate performance over reflection history.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceMetrics {
    pub response_quality: f32,
    pub user_satisfaction: f32,
    pub task_completion: f32,
    pub efficiency: f32,
    /// Last five scores versus earlier ones, normalized around 0.5 and
    /// clamped to [0.1, 1.0].
    pub improvement_trend: f32,
}

#[derive(Debug, Deserialize)]
struct QualityScores {
    clarity: f32,
    actionability: f32,
    personalization: f32,
    empathy: f32,
    overall: f32,
}

#[derive(Debug, Deserialize)]
struct StrengthsImprovements {
    strengths: Vec<String>,
    improvements: Vec<String>,
}

/// Per-agent reflection engine.
pub struct ReflectionEngine {
    agent: String,
    llm: Arc<dyn LlmClient>,
    history: RwLock<Vec<Reflection>>,
}

impl ReflectionEngine {
    pub fn new(agent: impl Into<String>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            agent: agent.into(),
            llm,
            history: RwLock::new(Vec::new()),
        }
    }

    /// Reflects on one response. Infallible by contract: every failure path
    /// lands on the documented defaults.
    pub async fn reflect(&self, response_content: &str) -> Reflection {
        let quality_score = self.assess_quality(response_content).await;
        let (strengths, improvements) = self.strengths_and_improvements(response_content).await;
        let lessons_learned = derive_lessons(&strengths, &improvements);

        let reflection = Reflection {
            quality_score,
            strengths,
            improvements,
            lessons_learned,
            timestamp: Utc::now(),
        };

        let mut history = self.history.write().await;
        history.push(reflection.clone());
        if history.len() > HISTORY_CAP {
            let excess = history.len() - HISTORY_CAP;
            history.drain(..excess);
        }
        tracing::debug!(agent = %self.agent, score = quality_score, "reflection recorded");
        reflection
    }

    async fn assess_quality(&self, content: &str) -> f32 {
        if content.is_empty() {
            return 0.8;
        }
        let schema = OutputSchema::new(
            "response_quality",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "clarity": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                    "actionability": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                    "personalization": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                    "empathy": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                    "overall": {"type": "number", "minimum": 0.0, "maximum": 1.0}
                },
                "required": ["clarity", "actionability", "personalization", "empathy", "overall"],
                "additionalProperties": false
            }),
        );
        let messages = [
            Message::system(
                "You evaluate career-guidance responses. Score clarity, actionability, \
                 personalization, empathy, and overall quality, each from 0.0 to 1.0.",
            ),
            Message::human(content.to_string()),
        ];
        let opts = CallOptions::new().with_temperature(0.1);
        match self.llm.structured(&messages, &schema, &opts).await {
            Ok(value) => match parse_structured::<QualityScores>(value) {
                Ok(scores) => {
                    tracing::trace!(
                        agent = %self.agent,
                        clarity = scores.clarity,
                        actionability = scores.actionability,
                        personalization = scores.personalization,
                        empathy = scores.empathy,
                        "quality sub-scores"
                    );
                    scores.overall.clamp(0.0, 1.0)
                }
                Err(e) => {
                    tracing::warn!(agent = %self.agent, error = %e, "quality parse fallback");
                    0.8
                }
            },
            Err(e) => {
                tracing::warn!(agent = %self.agent, error = %e, "quality scoring fallback");
                0.8
            }
        }
    }

    async fn strengths_and_improvements(&self, content: &str) -> (Vec<String>, Vec<String>) {
        let canned = || {
            (
                vec!["Clear communication".to_string(), "Helpful information".to_string()],
                vec![
                    "Could be more concise".to_string(),
                    "Could add more specific examples".to_string(),
                ],
            )
        };
        if content.is_empty() {
            return canned();
        }
        let schema = OutputSchema::new(
            "strengths_improvements",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "strengths": {"type": "array", "items": {"type": "string"}, "minItems": 1, "maxItems": 3},
                    "improvements": {"type": "array", "items": {"type": "string"}, "minItems": 1, "maxItems": 3}
                },
                "required": ["strengths", "improvements"],
                "additionalProperties": false
            }),
        );
        let messages = [
            Message::system(
                "Review this career-guidance response. List 1-3 brief strengths and 1-3 brief \
                 areas for improvement.",
            ),
            Message::human(content.to_string()),
        ];
        let opts = CallOptions::new().with_temperature(0.2);
        match self.llm.structured(&messages, &schema, &opts).await {
            Ok(value) => match parse_structured::<StrengthsImprovements>(value) {
                Ok(parsed) if !parsed.strengths.is_empty() && !parsed.improvements.is_empty() => {
                    (parsed.strengths, parsed.improvements)
                }
                _ => canned(),
            },
            Err(_) => canned(),
        }
    }

    /// Average metrics over reflection history, including the improvement trend.
    pub async fn performance_metrics(&self) -> PerformanceMetrics {
        let history = self.history.read().await;
        let scores: Vec<f32> = history.iter().map(|r| r.quality_score).collect();

        if scores.is_empty() {
            return PerformanceMetrics {
                response_quality: 0.8,
                user_satisfaction: 0.75,
                task_completion: 0.85,
                efficiency: 0.9,
                improvement_trend: 0.5,
            };
        }

        let avg_quality = scores.iter().sum::<f32>() / scores.len() as f32;
        let improvement_trend = if scores.len() >= 5 {
            let recent: f32 = scores[scores.len() - 5..].iter().sum::<f32>() / 5.0;
            let earlier = if scores.len() > 5 {
                scores[..scores.len() - 5].iter().sum::<f32>() / (scores.len() - 5) as f32
            } else {
                0.7
            };
            ((recent - earlier) + 0.5).clamp(0.1, 1.0)
        } else {
            0.5
        };

        PerformanceMetrics {
            response_quality: avg_quality,
            user_satisfaction: 0.9 * avg_quality,
            task_completion: (0.75 + 0.25 * avg_quality).min(1.0),
            efficiency: 0.7 + 0.2 * improvement_trend,
            improvement_trend,
        }
    }

    /// Number of retained reflections.
    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }
}

/// Lessons derived mechanically from strengths and improvements: reinforce the
/// top two strengths, rephrase the top two improvements as obligations.
fn derive_lessons(strengths: &[String], improvements: &[String]) -> Vec<String> {
    let mut lessons = Vec::new();
    for strength in strengths.iter().take(2) {
        lessons.push(format!("Continue to {}", strength.to_lowercase()));
    }
    for improvement in improvements.iter().take(2) {
        if let Some(rest) = improvement.strip_prefix("Could ") {
            lessons.push(format!("Should {rest}"));
        } else {
            lessons.push(format!("Should improve: {}", improvement.to_lowercase()));
        }
    }
    lessons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    fn scripted_reflection_llm() -> Arc<MockLlm> {
        Arc::new(
            MockLlm::new()
                .with_structured(serde_json::json!({
                    "clarity": 0.9, "actionability": 0.9, "personalization": 0.8,
                    "empathy": 0.9, "overall": 0.9
                }))
                .with_structured(serde_json::json!({
                    "strengths": ["Concrete next steps"],
                    "improvements": ["Could name a specific employer"]
                })),
        )
    }

    /// **Scenario**: a scripted reflection uses the LLM scores and derives lessons.
    #[tokio::test]
    async fn reflect_uses_scores_and_derives_lessons() {
        let engine = ReflectionEngine::new("mai", scripted_reflection_llm());
        let r = engine.reflect("Here is the plan.").await;
        assert!((r.quality_score - 0.9).abs() < 1e-6);
        assert_eq!(r.strengths, vec!["Concrete next steps"]);
        assert!(r.lessons_learned.iter().any(|l| l.starts_with("Continue to")));
        assert!(r
            .lessons_learned
            .iter()
            .any(|l| l == "Should name a specific employer"));
    }

    /// **Scenario**: LLM failure falls back to 0.8 quality and canned lists;
    /// the error never propagates.
    #[tokio::test]
    async fn reflect_falls_back_on_llm_failure() {
        let engine = ReflectionEngine::new("mai", Arc::new(MockLlm::unavailable()));
        let r = engine.reflect("Anything.").await;
        assert!((r.quality_score - 0.8).abs() < 1e-6);
        assert_eq!(r.strengths[0], "Clear communication");
        assert!(r.improvements[0].starts_with("Could"));
    }

    /// **Scenario**: with no history, metrics are the documented defaults.
    #[tokio::test]
    async fn metrics_defaults_with_no_history() {
        let engine = ReflectionEngine::new("mai", Arc::new(MockLlm::unavailable()));
        let m = engine.performance_metrics().await;
        assert!((m.response_quality - 0.8).abs() < 1e-6);
        assert!((m.improvement_trend - 0.5).abs() < 1e-6);
    }

    /// **Scenario**: improvement trend compares the last five scores against
    /// earlier ones and stays within [0.1, 1.0].
    #[tokio::test]
    async fn metrics_improvement_trend_from_history() {
        let engine = ReflectionEngine::new("mai", Arc::new(MockLlm::unavailable()));
        // Six fallback reflections, all 0.8: recent == earlier, trend == 0.5.
        for _ in 0..6 {
            engine.reflect("x").await;
        }
        let m = engine.performance_metrics().await;
        assert!((m.improvement_trend - 0.5).abs() < 1e-6);
        assert!(m.improvement_trend >= 0.1 && m.improvement_trend <= 1.0);
    }

    /// **Scenario**: history is capped, oldest entries dropped first.
    #[tokio::test]
    async fn history_is_capped() {
        let engine = ReflectionEngine::new("mai", Arc::new(MockLlm::unavailable()));
        for _ in 0..(HISTORY_CAP + 5) {
            engine.reflect("x").await;
        }
        assert_eq!(engine.history_len().await, HISTORY_CAP);
    }
}
