//! Session-scoped conversational memory
//!
//! Every session keeps a fixed-capacity window of its most recent turns. The window is
//! maintained on write: appending to a full session evicts exactly the oldest turn.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One user message and the assistant's answer to it.
///
/// Only the row count of a result set is kept, never the rows themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user_message: String,
    pub bot_response: String,
    /// Sanitized SQL that passed validation, if any was run
    pub query: Option<String>,
    pub result_row_count: Option<usize>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(user_message: impl Into<String>, bot_response: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            bot_response: bot_response.into(),
            query: None,
            result_row_count: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_result_row_count(mut self, count: Option<usize>) -> Self {
        self.result_row_count = count;
        self
    }
}

pub trait SessionStore: Send + Sync {
    /// Append a turn, evicting the oldest one if the session is full
    fn append(&self, session_id: &str, turn: ConversationTurn);
    /// Turns oldest-first; empty for unknown sessions
    fn history(&self, session_id: &str) -> Vec<ConversationTurn>;
    fn clear(&self, session_id: &str);
    fn session_count(&self) -> usize;
}

/// Fixed-capacity ring of turns for a single session
#[derive(Debug, Clone)]
struct TurnRing {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl TurnRing {
    fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, turn: ConversationTurn) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    fn to_vec(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }
}

/// In-process session store.
///
/// Each map entry is guarded by its shard lock, so `append`, `history` and `clear`
/// on the same session id never interleave.
#[derive(Clone)]
pub struct InMemorySessionStore {
    store: Arc<DashMap<String, TurnRing>>,
    max_turns_per_session: usize,
}

impl InMemorySessionStore {
    pub const DEFAULT_MAX_TURNS: usize = 10;

    pub fn new(max_turns_per_session: usize) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            max_turns_per_session: max_turns_per_session.max(1),
        }
    }

    pub fn max_turns_per_session(&self) -> usize {
        self.max_turns_per_session
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_TURNS)
    }
}

impl SessionStore for InMemorySessionStore {
    fn append(&self, session_id: &str, turn: ConversationTurn) {
        let capacity = self.max_turns_per_session;
        let mut entry = self
            .store
            .entry(session_id.to_string())
            .or_insert_with(|| TurnRing::new(capacity));
        entry.push(turn);
        debug!("Session {} now holds {} turn(s)", session_id, entry.turns.len());
    }

    fn history(&self, session_id: &str) -> Vec<ConversationTurn> {
        match self.store.get(session_id) {
            Some(ring) => ring.to_vec(),
            None => Vec::new(),
        }
    }

    fn clear(&self, session_id: &str) {
        if self.store.remove(session_id).is_some() {
            debug!("Cleared session {}", session_id);
        }
    }

    fn session_count(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(i: usize) -> ConversationTurn {
        ConversationTurn::new(format!("Message {}", i), format!("Response {}", i))
    }

    #[test]
    fn test_append_and_read_back() {
        let store = InMemorySessionStore::new(5);
        store.append(
            "test_session",
            ConversationTurn::new("Hello", "Hi there!")
                .with_query(Some("SELECT 1;".to_string()))
                .with_result_row_count(Some(1)),
        );

        let history = store.history("test_session");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].user_message, "Hello");
        assert_eq!(history[0].bot_response, "Hi there!");
        assert_eq!(history[0].query.as_deref(), Some("SELECT 1;"));
        assert_eq!(history[0].result_row_count, Some(1));
    }

    #[test]
    fn test_history_is_a_sliding_window() {
        let store = InMemorySessionStore::new(5);
        for i in 0..10 {
            store.append("test_session", turn(i));
        }

        let history = store.history("test_session");
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].user_message, "Message 5");
        assert_eq!(history[4].user_message, "Message 9");
        assert!(history.iter().all(|t| t.user_message != "Message 0"));
    }

    #[test]
    fn test_eviction_drops_exactly_one_turn() {
        let store = InMemorySessionStore::new(3);
        for i in 0..3 {
            store.append("s", turn(i));
        }
        store.append("s", turn(3));

        let messages: Vec<_> = store.history("s").into_iter().map(|t| t.user_message).collect();
        assert_eq!(messages, vec!["Message 1", "Message 2", "Message 3"]);
    }

    #[test]
    fn test_unknown_session_is_empty() {
        let store = InMemorySessionStore::default();
        assert!(store.history("nope").is_empty());
        store.clear("nope");
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_clear_history() {
        let store = InMemorySessionStore::new(5);
        store.append("test_session", ConversationTurn::new("Hello", "Hi"));
        store.append("other", ConversationTurn::new("Hey", "Hi"));
        store.clear("test_session");

        assert!(store.history("test_session").is_empty());
        assert_eq!(store.history("other").len(), 1);
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let store = InMemorySessionStore::new(0);
        store.append("s", turn(0));
        store.append("s", turn(1));
        assert_eq!(store.max_turns_per_session(), 1);
        assert_eq!(store.history("s")[0].user_message, "Message 1");
    }

    #[tokio::test]
    async fn test_concurrent_appends_respect_cap() {
        let store = InMemorySessionStore::new(5);
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append("shared", turn(i));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.history("shared").len(), 5);
    }
}
