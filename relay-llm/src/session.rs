//! In-memory per-user conversation history.
//!
//! Each user gets a bounded list of turns. Two bounds apply and they are
//! independent:
//! - `max_stored`: how many turns are kept (oldest evicted first)
//! - `context_turns`: how many of the most recent turns are sent with a request

use crate::message::Turn;
use relay_common::config::SessionConfig;
use std::collections::HashMap;

/// Default number of turns kept per user (10 exchanges).
pub const MAX_STORED_TURNS: usize = 20;

/// Default number of prior turns sent as context (5 exchanges).
pub const CONTEXT_TURNS: usize = 10;

/// Ordered turns for one user, oldest first.
pub type History = Vec<Turn>;

/// Process-lifetime history store keyed by user identifier.
///
/// Not synchronized: the store is owned by the entry point and lent to the
/// single message-handling path.
#[derive(Debug)]
pub struct HistoryStore {
    histories: HashMap<String, History>,
    max_stored: usize,
    context_turns: usize,
}

impl HistoryStore {
    /// Create a store with the default bounds.
    pub fn new() -> Self {
        Self::with_limits(MAX_STORED_TURNS, CONTEXT_TURNS)
    }

    /// Create a store with explicit bounds. Zero bounds are raised to 1.
    pub fn with_limits(max_stored: usize, context_turns: usize) -> Self {
        Self {
            histories: HashMap::new(),
            max_stored: max_stored.max(1),
            context_turns: context_turns.max(1),
        }
    }

    /// Create a store from configuration.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::with_limits(config.max_stored_turns, config.context_turns)
    }

    pub const fn max_stored(&self) -> usize {
        self.max_stored
    }

    pub const fn context_turns(&self) -> usize {
        self.context_turns
    }

    /// Get the history for a user, creating an empty one on first use.
    pub fn get_or_create(&mut self, user_id: &str) -> &History {
        self.histories.entry(user_id.to_string()).or_default()
    }

    /// Append a single turn and enforce the storage bound.
    pub fn append(&mut self, user_id: &str, turn: Turn) {
        let max_stored = self.max_stored;
        let history = self.histories.entry(user_id.to_string()).or_default();
        history.push(turn);
        truncate_front(history, max_stored);
    }

    /// Record a completed exchange: the question and its answer, as a pair.
    pub fn record_exchange(&mut self, user_id: &str, question: &str, answer: &str) {
        let max_stored = self.max_stored;
        let history = self.histories.entry(user_id.to_string()).or_default();
        history.push(Turn::user(question));
        history.push(Turn::assistant(answer));
        truncate_front(history, max_stored);
    }

    /// The most recent turns to send as context, oldest first.
    ///
    /// Unknown users get an empty slice; no session is created.
    pub fn context(&self, user_id: &str) -> &[Turn] {
        match self.histories.get(user_id) {
            Some(history) => {
                let start = history.len().saturating_sub(self.context_turns);
                &history[start..]
            }
            None => &[],
        }
    }

    /// Forget the history of a user. Unknown users are a no-op.
    pub fn clear(&mut self, user_id: &str) {
        if let Some(history) = self.histories.get_mut(user_id) {
            history.clear();
        }
    }

    /// Number of stored turns for a user.
    pub fn len(&self, user_id: &str) -> usize {
        self.histories.get(user_id).map_or(0, Vec::len)
    }

    /// Whether the user has no stored turns.
    pub fn is_empty(&self, user_id: &str) -> bool {
        self.len(user_id) == 0
    }

    /// Number of users with a session.
    pub fn session_count(&self) -> usize {
        self.histories.len()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_front(history: &mut History, max: usize) {
    if history.len() > max {
        let excess = history.len() - max;
        history.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[test]
    fn test_get_or_create_is_lazy() {
        let mut store = HistoryStore::new();
        assert_eq!(store.session_count(), 0);
        assert!(store.get_or_create("42").is_empty());
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn test_history_never_exceeds_storage_bound() {
        let mut store = HistoryStore::new();
        for i in 0..37 {
            store.record_exchange("42", &format!("q{i}"), &format!("a{i}"));
            assert!(store.len("42") <= MAX_STORED_TURNS);
        }
        for i in 0..5 {
            store.append("42", Turn::user(format!("extra{i}")));
            assert!(store.len("42") <= MAX_STORED_TURNS);
        }
        assert_eq!(store.len("42"), MAX_STORED_TURNS);
    }

    #[test]
    fn test_oldest_turns_evicted_first() {
        let mut store = HistoryStore::new();
        for i in 0..11 {
            store.record_exchange("42", &format!("q{i}"), &format!("a{i}"));
        }
        let history = store.get_or_create("42");
        assert_eq!(history.len(), 20);
        assert_eq!(history[0], Turn::user("q1"));
        assert_eq!(history[19], Turn::assistant("a10"));
    }

    #[test]
    fn test_context_window_is_independent_of_storage() {
        let mut store = HistoryStore::new();
        for i in 0..10 {
            store.record_exchange("42", &format!("q{i}"), &format!("a{i}"));
        }
        assert_eq!(store.len("42"), 20);

        let context = store.context("42");
        assert_eq!(context.len(), CONTEXT_TURNS);
        assert_eq!(context[0], Turn::user("q5"));
        assert_eq!(context[9], Turn::assistant("a9"));
    }

    #[test]
    fn test_context_shorter_than_window() {
        let mut store = HistoryStore::new();
        store.record_exchange("42", "hi", "hello");
        let context = store.context("42");
        assert_eq!(context.len(), 2);
        assert_eq!(context[0].role(), Role::User);
        assert_eq!(context[1].role(), Role::Assistant);
    }

    #[test]
    fn test_context_for_unknown_user() {
        let store = HistoryStore::new();
        assert!(store.context("nobody").is_empty());
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_clear_unknown_user_is_noop() {
        let mut store = HistoryStore::new();
        store.clear("nobody");
        assert_eq!(store.session_count(), 0);
        assert!(store.is_empty("nobody"));
    }

    #[test]
    fn test_clear_only_affects_one_user() {
        let mut store = HistoryStore::new();
        store.record_exchange("alice", "q", "a");
        store.record_exchange("bob", "q", "a");
        store.clear("alice");
        assert!(store.is_empty("alice"));
        assert_eq!(store.len("bob"), 2);
    }

    #[test]
    fn test_custom_limits() {
        let mut store = HistoryStore::with_limits(4, 2);
        for i in 0..5 {
            store.record_exchange("42", &format!("q{i}"), &format!("a{i}"));
        }
        assert_eq!(store.len("42"), 4);
        assert_eq!(store.context("42"), &[Turn::user("q4"), Turn::assistant("a4")]);
    }

    #[test]
    fn test_zero_limits_raised() {
        let store = HistoryStore::with_limits(0, 0);
        assert_eq!(store.max_stored(), 1);
        assert_eq!(store.context_turns(), 1);
    }
}
