//! Conversation memory: per-thread checkpoints and per-agent episodic memory.
//!
//! - [`Checkpointer`] / [`MemorySaver`]: per-thread state snapshots used by the
//!   graph engine across interrupt suspend/resume boundaries.
//! - [`AgentMemory`]: per-specialist episodic log + semantic map + embedding
//!   cache with similarity retrieval.

mod agent_memory;
mod checkpoint;
mod config;
mod memory_saver;

pub use agent_memory::{AgentMemory, Episode};
pub use checkpoint::{Checkpoint, CheckpointError, Checkpointer};
pub use config::RunnableConfig;
pub use memory_saver::MemorySaver;
