//! Per-agent memory: episodic log, semantic key/value, embedding cache.
//!
//! Retrieval ranks cached embeddings by cosine similarity against the query
//! embedding, ties broken more-recent-first; when embeddings are unavailable
//! (no embedder configured, or the call fails) it falls back to the most
//! recent episodes in reverse chronological order. Failures never propagate:
//! writes are best-effort and failed reads degrade to the recency fallback.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::llm::LlmClient;

/// One episodic memory entry, append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Episode {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: Utc::now(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

#[derive(Default)]
struct MemoryInner {
    episodes: Vec<Episode>,
    semantic: HashMap<String, serde_json::Value>,
    /// Episode index → embedding of its content.
    embeddings: HashMap<usize, Vec<f32>>,
}

/// Per-specialist memory store. Writes serialize behind the lock; reads are
/// concurrent.
pub struct AgentMemory {
    agent: String,
    embedder: Option<Arc<dyn LlmClient>>,
    inner: RwLock<MemoryInner>,
}

impl AgentMemory {
    /// Memory without an embedder: retrieval uses the recency fallback only.
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            embedder: None,
            inner: RwLock::new(MemoryInner::default()),
        }
    }

    /// Memory with an embedding-capable gateway for similarity retrieval.
    pub fn with_embedder(agent: impl Into<String>, embedder: Arc<dyn LlmClient>) -> Self {
        Self {
            agent: agent.into(),
            embedder: Some(embedder),
            inner: RwLock::new(MemoryInner::default()),
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Appends an episode and lazily caches an embedding of its content.
    /// Embedding failure is logged and skipped; the episode is stored either way.
    pub async fn store_episode(&self, episode: Episode) {
        let embedding = match &self.embedder {
            Some(llm) => match llm.embed(&episode.content).await {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(agent = %self.agent, error = %e, "episode embedding failed");
                    None
                }
            },
            None => None,
        };

        let mut inner = self.inner.write().await;
        let index = inner.episodes.len();
        inner.episodes.push(episode);
        if let Some(v) = embedding {
            inner.embeddings.insert(index, v);
        }
    }

    /// Returns the `k` most relevant episodes for `query`.
    ///
    /// Deterministic given the same cache contents and query embedding.
    pub async fn retrieve(&self, query: &str, k: usize) -> Vec<Episode> {
        if k == 0 {
            return Vec::new();
        }

        let query_embedding = match &self.embedder {
            Some(llm) => match llm.embed(query).await {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(agent = %self.agent, error = %e, "query embedding failed");
                    None
                }
            },
            None => None,
        };

        let inner = self.inner.read().await;
        let Some(query_embedding) = query_embedding else {
            return Self::most_recent(&inner.episodes, k);
        };
        if inner.embeddings.is_empty() {
            return Self::most_recent(&inner.episodes, k);
        }

        let mut ranked: Vec<(f32, usize)> = inner
            .embeddings
            .iter()
            .map(|(&idx, emb)| (cosine_similarity(&query_embedding, emb), idx))
            .collect();
        // Highest similarity first; ties break more-recent-first (higher index).
        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.1.cmp(&a.1))
        });

        ranked
            .into_iter()
            .take(k)
            .filter_map(|(_, idx)| inner.episodes.get(idx).cloned())
            .collect()
    }

    /// Replace-on-write semantic knowledge.
    pub async fn update_semantic(&self, key: impl Into<String>, value: serde_json::Value) {
        let mut inner = self.inner.write().await;
        inner.semantic.insert(key.into(), value);
    }

    /// Reads a semantic entry.
    pub async fn semantic(&self, key: &str) -> Option<serde_json::Value> {
        let inner = self.inner.read().await;
        inner.semantic.get(key).cloned()
    }

    /// Number of stored episodes.
    pub async fn episode_count(&self) -> usize {
        self.inner.read().await.episodes.len()
    }

    fn most_recent(episodes: &[Episode], k: usize) -> Vec<Episode> {
        episodes.iter().rev().take(k).cloned().collect()
    }
}

/// Cosine similarity; zero-length or zero-norm vectors score 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
