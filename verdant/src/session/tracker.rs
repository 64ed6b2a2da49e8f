//! Per-(user, conversation) rolling message window and usage counters.
//!
//! The map is sharded by key with per-shard mutual exclusion (dashmap); there
//! is no cross-conversation shared mutable state. Completed conversations are
//! purged after a grace period.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::agents::SpecialistKind;
use crate::message::Message;

/// Rolling window: the last N messages per conversation.
pub const HISTORY_WINDOW: usize = 20;

#[derive(Debug, Clone, Default)]
struct ConversationWindow {
    messages: Vec<Message>,
    complete: bool,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct UserStats {
    total_sessions: u64,
    specialists_used: BTreeSet<&'static str>,
}

/// Tracks conversation windows and per-user aggregates.
pub struct SessionTracker {
    windows: DashMap<(String, String), ConversationWindow>,
    users: DashMap<String, UserStats>,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
            users: DashMap::new(),
        }
    }

    /// Appends the turn's messages (deduplicated by id), truncates to the
    /// window, and bumps counters.
    pub fn record_turn(
        &self,
        user_id: &str,
        conversation_id: &str,
        messages: &[Message],
        specialists: &[SpecialistKind],
        complete: bool,
    ) {
        let key = (user_id.to_string(), conversation_id.to_string());
        let is_new = !self.windows.contains_key(&key);
        let mut window = self.windows.entry(key).or_default();

        crate::channels::append_by_key(&mut window.messages, messages.to_vec(), |m| m.id);
        if window.messages.len() > HISTORY_WINDOW {
            let excess = window.messages.len() - HISTORY_WINDOW;
            window.messages.drain(..excess);
        }
        if complete && !window.complete {
            window.complete = true;
            window.completed_at = Some(Utc::now());
        }
        drop(window);

        let mut stats = self.users.entry(user_id.to_string()).or_default();
        if is_new {
            stats.total_sessions += 1;
        }
        for specialist in specialists {
            stats.specialists_used.insert(specialist.as_str());
        }
    }

    /// The tracked window for a conversation (empty if unknown).
    pub fn history(&self, user_id: &str, conversation_id: &str) -> Vec<Message> {
        self.windows
            .get(&(user_id.to_string(), conversation_id.to_string()))
            .map(|w| w.messages.clone())
            .unwrap_or_default()
    }

    /// Conversation ids tracked for a user, sorted.
    pub fn conversations(&self, user_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .windows
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.key().1.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Removes one conversation window. Returns whether it existed.
    pub fn delete(&self, user_id: &str, conversation_id: &str) -> bool {
        self.windows
            .remove(&(user_id.to_string(), conversation_id.to_string()))
            .is_some()
    }

    /// Per-user aggregates for the stats endpoint.
    pub fn stats(&self, user_id: &str) -> serde_json::Value {
        match self.users.get(user_id) {
            Some(stats) => serde_json::json!({
                "total_sessions": stats.total_sessions,
                "specialists_used": stats.specialists_used.iter().collect::<Vec<_>>(),
            }),
            None => serde_json::json!({
                "total_sessions": 0,
                "specialists_used": [],
            }),
        }
    }

    /// Number of tracked conversations.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Drops windows for conversations completed longer than `grace` ago.
    /// Returns how many were purged.
    pub fn purge_completed(&self, grace: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(grace).unwrap_or_else(|_| chrono::Duration::zero());
        let stale: Vec<(String, String)> = self
            .windows
            .iter()
            .filter(|entry| {
                entry.value().complete
                    && entry
                        .value()
                        .completed_at
                        .map(|t| t < cutoff)
                        .unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect();
        let count = stale.len();
        for key in stale {
            self.windows.remove(&key);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(n: usize) -> Vec<Message> {
        (0..n).map(|i| Message::human(format!("m{i}"))).collect()
    }

    /// **Scenario**: the window truncates to the last 20 messages, keeping the
    /// most recent.
    #[test]
    fn window_truncates_to_last_twenty() {
        let tracker = SessionTracker::new();
        tracker.record_turn("u1", "c1", &messages(25), &[], false);
        let history = tracker.history("u1", "c1");
        assert_eq!(history.len(), HISTORY_WINDOW);
        assert_eq!(history.last().map(|m| m.content.as_str()), Some("m24"));
        assert_eq!(history.first().map(|m| m.content.as_str()), Some("m5"));
    }

    /// **Scenario**: re-recording the same messages does not duplicate them.
    #[test]
    fn record_turn_dedups_by_id() {
        let tracker = SessionTracker::new();
        let msgs = messages(3);
        tracker.record_turn("u1", "c1", &msgs, &[], false);
        tracker.record_turn("u1", "c1", &msgs, &[], false);
        assert_eq!(tracker.history("u1", "c1").len(), 3);
    }

    /// **Scenario**: counters track sessions and distinct specialists.
    #[test]
    fn stats_track_sessions_and_specialists() {
        let tracker = SessionTracker::new();
        tracker.record_turn("u1", "c1", &messages(1), &[SpecialistKind::Mai], false);
        tracker.record_turn(
            "u1",
            "c1",
            &messages(1),
            &[SpecialistKind::Mai, SpecialistKind::Lauren],
            false,
        );
        tracker.record_turn("u1", "c2", &messages(1), &[], false);

        let stats = tracker.stats("u1");
        assert_eq!(stats["total_sessions"], 2);
        let used: Vec<String> = stats["specialists_used"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert_eq!(used, vec!["lauren", "mai"]);
    }

    /// **Scenario**: purge removes only conversations completed before the
    /// grace window.
    #[test]
    fn purge_respects_grace() {
        let tracker = SessionTracker::new();
        tracker.record_turn("u1", "done", &messages(1), &[], true);
        tracker.record_turn("u1", "open", &messages(1), &[], false);

        // Grace of one hour: nothing completed that long ago yet.
        assert_eq!(tracker.purge_completed(Duration::from_secs(3600)), 0);
        // Zero grace: the completed conversation goes.
        assert_eq!(tracker.purge_completed(Duration::ZERO), 1);
        assert!(tracker.history("u1", "done").is_empty());
        assert!(!tracker.history("u1", "open").is_empty());
    }
}
