//! Conversation message types.
//!
//! Every message carries a unique id; the graph's message reducer appends by id,
//! which keeps the reducer idempotent when a node is re-entered after an
//! interrupt. Used by `ConversationState::messages` and by agents that read the
//! latest human turn.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// User input.
    Human,
    /// Specialist or workflow reply.
    Ai,
    /// System prompt or operator note; typically first in the list.
    System,
}

/// A single message in the conversation, append-only within a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique id; the reducer skips messages whose id is already present.
    pub id: Uuid,
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Free-form attributes (specialist name, delegation markers, etc.).
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Message {
    fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            content: content.into(),
            timestamp: Utc::now(),
            attributes: BTreeMap::new(),
        }
    }

    /// Creates a human (user) message.
    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Human, content)
    }

    /// Creates an AI message.
    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Ai, content)
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageKind::System, content)
    }

    /// Attaches an attribute (builder).
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// True for human messages.
    pub fn is_human(&self) -> bool {
        self.kind == MessageKind::Human
    }

    /// True for AI messages.
    pub fn is_ai(&self) -> bool {
        self.kind == MessageKind::Ai
    }
}

/// Returns the latest human message content in `messages`, if any.
pub fn latest_human_content(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.is_human())
        .map(|m| m.content.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: human/ai/system constructors set the right kind and content.
    #[test]
    fn message_constructors() {
        let h = Message::human("u");
        assert!(h.is_human());
        assert_eq!(h.content, "u");
        let a = Message::ai("a");
        assert!(a.is_ai());
        let s = Message::system("s");
        assert_eq!(s.kind, MessageKind::System);
    }

    /// **Scenario**: two messages with identical content still get distinct ids.
    #[test]
    fn message_ids_are_unique() {
        let a = Message::human("same");
        let b = Message::human("same");
        assert_ne!(a.id, b.id);
    }

    /// **Scenario**: a Message round-trips through serde with attributes intact.
    #[test]
    fn message_serde_roundtrip() {
        let msg = Message::ai("reply").with_attribute("specialist", serde_json::json!("mai"));
        let json = serde_json::to_string(&msg).expect("serialize");
        let back: Message = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.id, msg.id);
        assert_eq!(back.content, "reply");
        assert_eq!(back.attributes.get("specialist"), Some(&serde_json::json!("mai")));
    }

    /// **Scenario**: latest_human_content skips trailing AI messages.
    #[test]
    fn latest_human_skips_ai() {
        let messages = vec![
            Message::human("first"),
            Message::ai("reply"),
            Message::human("second"),
            Message::ai("reply2"),
        ];
        assert_eq!(latest_human_content(&messages), Some("second"));
        assert_eq!(latest_human_content(&[]), None);
    }
}
