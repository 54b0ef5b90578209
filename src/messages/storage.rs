use super::types::ChatTurn;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared, append-only log of chat turns for one session.
///
/// Turns are only ever appended in arrival order; `clear` is the sole
/// removal path and exists for session reset.
#[derive(Debug, Clone)]
pub struct TurnLog {
    turns: Arc<RwLock<Vec<ChatTurn>>>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self {
            turns: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn push(&self, turn: ChatTurn) {
        self.turns.write().push(turn);
    }

    pub fn snapshot(&self) -> Vec<ChatTurn> {
        self.turns.read().clone()
    }

    pub fn last(&self) -> Option<ChatTurn> {
        self.turns.read().last().cloned()
    }

    pub fn clear(&self) {
        self.turns.write().clear();
    }

    pub fn len(&self) -> usize {
        self.turns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.read().is_empty()
    }
}

impl Default for TurnLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::types::Role;

    #[test]
    fn test_push_preserves_order() {
        let log = TurnLog::new();
        log.push(ChatTurn::user("first"));
        log.push(ChatTurn::assistant("second"));
        log.push(ChatTurn::user("third"));

        let turns = log.snapshot();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].text, "first");
        assert_eq!(turns[1].text, "second");
        assert_eq!(turns[2].text, "third");
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[test]
    fn test_clones_share_storage() {
        let log = TurnLog::new();
        let view = log.clone();

        log.push(ChatTurn::user("hello"));
        assert_eq!(view.len(), 1);
        assert_eq!(view.last().unwrap().text, "hello");
    }

    #[test]
    fn test_clear() {
        let log = TurnLog::new();
        log.push(ChatTurn::user("hello"));
        assert!(!log.is_empty());

        log.clear();
        assert!(log.is_empty());
        assert!(log.last().is_none());
    }
}
