//! Checkpoint snapshot and the Checkpointer trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::RunnableConfig;

/// Error for checkpoint operations.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// `thread_id` missing from the config.
    #[error("thread_id required for checkpointing")]
    ThreadIdRequired,
    /// Backend failure; message is opaque to avoid leaking backend types.
    #[error("checkpoint storage: {0}")]
    Storage(String),
}

/// One checkpoint: state snapshot plus the node to re-enter on resume.
#[derive(Debug, Clone)]
pub struct Checkpoint<S> {
    pub id: String,
    pub ts: DateTime<Utc>,
    /// Graph state at the time of the snapshot.
    pub state: S,
    /// Engine step at which the snapshot was taken.
    pub step: u32,
    /// Set when the snapshot was taken because a node interrupted; resume
    /// re-enters this node.
    pub suspended_node: Option<String>,
}

impl<S> Checkpoint<S> {
    pub fn from_state(state: S, step: u32, suspended_node: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            state,
            step,
            suspended_node,
        }
    }
}

/// Per-thread checkpoint store used by the graph engine.
///
/// Saved on interrupt and at termination when the run config carries a
/// `thread_id`. `get` returns the latest checkpoint for the thread.
#[async_trait]
pub trait Checkpointer<S>: Send + Sync
where
    S: Clone + Send + Sync + 'static,
{
    async fn put(
        &self,
        config: &RunnableConfig,
        checkpoint: &Checkpoint<S>,
    ) -> Result<String, CheckpointError>;

    async fn get(&self, config: &RunnableConfig) -> Result<Option<Checkpoint<S>>, CheckpointError>;
}
