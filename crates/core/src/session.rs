use crate::models::{Role, Turn};
use chrono::Utc;
use uuid::Uuid;

/// Append-only history of one chat session.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn {
            role,
            content: content.into(),
            at: Utc::now(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    id: Uuid,
    transcript: Transcript,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            transcript: Transcript::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Records a completed exchange.
    pub(crate) fn record_exchange(&mut self, question: &str, answer: &str) {
        self.transcript.push(Role::User, question);
        self.transcript.push(Role::Assistant, answer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchanges_append_in_order() {
        let mut session = ChatSession::new();
        session.record_exchange("first?", "one");
        session.record_exchange("second?", "two");

        let roles: Vec<_> = session.transcript().turns().iter().map(|turn| turn.role).collect();
        let contents: Vec<_> = session
            .transcript()
            .turns()
            .iter()
            .map(|turn| turn.content.as_str())
            .collect();

        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(contents, vec!["first?", "one", "second?", "two"]);
    }

    #[test]
    fn sessions_have_distinct_ids() {
        assert_ne!(ChatSession::new().id(), ChatSession::new().id());
        assert!(ChatSession::default().transcript().is_empty());
    }
}
