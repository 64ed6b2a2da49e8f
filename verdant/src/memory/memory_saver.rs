//! In-memory checkpointer. Not persistent; for dev and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::checkpoint::{Checkpoint, CheckpointError, Checkpointer};
use super::config::RunnableConfig;

/// In-memory checkpointer keyed by `(thread_id, checkpoint_ns)`; each thread
/// keeps its checkpoints newest-last.
pub struct MemorySaver<S> {
    inner: Arc<RwLock<HashMap<String, Vec<Checkpoint<S>>>>>,
}

impl<S> MemorySaver<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn thread_key(config: &RunnableConfig) -> Result<String, CheckpointError> {
        let thread_id = config
            .thread_id
            .as_deref()
            .ok_or(CheckpointError::ThreadIdRequired)?;
        Ok(format!("{}:{}", thread_id, config.checkpoint_ns))
    }
}

impl<S> Default for MemorySaver<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S> Checkpointer<S> for MemorySaver<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn put(
        &self,
        config: &RunnableConfig,
        checkpoint: &Checkpoint<S>,
    ) -> Result<String, CheckpointError> {
        let key = Self::thread_key(config)?;
        let mut guard = self.inner.write().await;
        guard.entry(key).or_default().push(checkpoint.clone());
        Ok(checkpoint.id.clone())
    }

    async fn get(&self, config: &RunnableConfig) -> Result<Option<Checkpoint<S>>, CheckpointError> {
        let key = Self::thread_key(config)?;
        let guard = self.inner.read().await;
        Ok(guard.get(&key).and_then(|list| list.last().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: put then get returns the latest checkpoint for the thread.
    #[tokio::test]
    async fn put_get_latest() {
        let saver = MemorySaver::<u32>::new();
        let config = RunnableConfig::for_thread("t1");
        saver
            .put(&config, &Checkpoint::from_state(1, 1, None))
            .await
            .unwrap();
        saver
            .put(&config, &Checkpoint::from_state(2, 2, Some("n".into())))
            .await
            .unwrap();
        let latest = saver.get(&config).await.unwrap().unwrap();
        assert_eq!(latest.state, 2);
        assert_eq!(latest.suspended_node.as_deref(), Some("n"));
    }

    /// **Scenario**: missing thread_id is an error; unknown thread is None.
    #[tokio::test]
    async fn thread_id_required_and_unknown_thread_none() {
        let saver = MemorySaver::<u32>::new();
        let no_thread = RunnableConfig::default();
        assert!(matches!(
            saver.get(&no_thread).await,
            Err(CheckpointError::ThreadIdRequired)
        ));
        let unknown = RunnableConfig::for_thread("nope");
        assert!(saver.get(&unknown).await.unwrap().is_none());
    }

    /// **Scenario**: different checkpoint namespaces do not collide.
    #[tokio::test]
    async fn namespaces_are_isolated() {
        let saver = MemorySaver::<u32>::new();
        let outer = RunnableConfig::for_thread("t");
        let mut inner = RunnableConfig::for_thread("t");
        inner.checkpoint_ns = "empathy".into();
        saver.put(&outer, &Checkpoint::from_state(1, 1, None)).await.unwrap();
        saver.put(&inner, &Checkpoint::from_state(9, 1, None)).await.unwrap();
        assert_eq!(saver.get(&outer).await.unwrap().unwrap().state, 1);
        assert_eq!(saver.get(&inner).await.unwrap().unwrap().state, 9);
    }
}
